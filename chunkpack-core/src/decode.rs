use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::header::{FileEntry, Header};
use crate::inspect::inspect;
use crate::layout::IO_BUF_SIZE;
use crate::path_safety::{validate_path, PathPolicy};

#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderConfig {
    pub policy: PathPolicy,
}

#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub header: Header,
    pub written: Vec<PathBuf>,
    pub elapsed: Duration,
}

pub struct Decoder;

impl Decoder {
    /// Rebuild the original files from the chunk set in `input` under `output`.
    ///
    /// Everything is validated (header, chunk names and lengths, entry paths)
    /// before the first output byte is written.
    pub fn decode(input: &Path, output: &Path, cfg: &DecoderConfig) -> Result<DecodeReport> {
        let t0 = Instant::now();
        let report = inspect(input)?;
        let header = report.header;

        fs::create_dir_all(output).map_err(|e| Error::write(output, e))?;
        let targets = header
            .entries
            .iter()
            .map(|e| validate_path(output, &e.name, cfg.policy))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "unpacking {} file(s), {} bytes from {} chunk(s)",
            header.entries.len(),
            header.total_bytes,
            report.chunks.len()
        );

        let mut stream = ChunkStream::new(input, report.chunks);
        let mut buf = vec![0u8; IO_BUF_SIZE];
        for (entry, target) in header.entries.iter().zip(&targets) {
            write_entry(&mut stream, entry, target, &mut buf)?;
            debug!("wrote {:?} as {:?}", entry.name, target);
        }
        stream.expect_end()?;

        Ok(DecodeReport { header, written: targets, elapsed: t0.elapsed() })
    }
}

fn write_entry(
    stream: &mut ChunkStream,
    entry: &FileEntry,
    target: &Path,
    buf: &mut [u8],
) -> Result<()> {
    if stream.position() != entry.offset {
        return Err(Error::CorruptChunk {
            path: stream.dir.clone(),
            reason: format!(
                "stream at byte {} but {:?} starts at {}",
                stream.position(),
                entry.name,
                entry.offset
            ),
        });
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::write(parent, e))?;
    }
    let f = File::create(target).map_err(|e| Error::write(target, e))?;
    let mut out = BufWriter::new(f);
    let mut remaining = entry.size;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = stream.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::MissingChunk {
                dir: stream.dir.clone(),
                reason: format!(
                    "stream ended at byte {} with {} byte(s) of {:?} still missing",
                    stream.position(),
                    remaining,
                    entry.name
                ),
            });
        }
        out.write_all(&buf[..n]).map_err(|e| Error::write(target, e))?;
        remaining -= n as u64;
    }
    out.into_inner().map_err(|e| Error::write(target, e.into_error()))?;
    Ok(())
}

/// The logical stream: chunk files read back to back, one open at a time.
struct ChunkStream {
    dir: PathBuf,
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<(PathBuf, File)>,
    position: u64,
}

impl ChunkStream {
    fn new(dir: &Path, chunks: Vec<PathBuf>) -> Self {
        Self { dir: dir.to_path_buf(), pending: chunks.into_iter(), current: None, position: 0 }
    }

    fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` from the current chunk, moving to the next one at its end.
    /// Returns 0 only once every chunk is drained.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let (path, mut f) = match self.current.take() {
                Some(c) => c,
                None => match self.pending.next() {
                    Some(p) => {
                        let f = File::open(&p).map_err(|e| Error::read(&p, e))?;
                        (p, f)
                    }
                    None => return Ok(0),
                },
            };
            match f.read(buf) {
                Ok(0) => debug!("drained chunk {:?}", path),
                Ok(n) => {
                    self.position += n as u64;
                    self.current = Some((path, f));
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.current = Some((path, f)),
                Err(e) => return Err(Error::read(&path, e)),
            }
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        let mut tail = [0u8; 1];
        if self.read(&mut tail)? != 0 {
            let path =
                self.current.as_ref().map(|(p, _)| p.clone()).unwrap_or_else(|| self.dir.clone());
            return Err(Error::CorruptChunk {
                path,
                reason: format!("data continues past the last entry at byte {}", self.position - 1),
            });
        }
        Ok(())
    }
}
