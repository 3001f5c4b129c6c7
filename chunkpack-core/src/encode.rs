use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::discover::{discover, Filters, InputFile};
use crate::error::{Error, Result};
use crate::header::{self, header_path, Header};
use crate::layout::{chunk_digits, chunk_name, parse_chunk_name, IO_BUF_SIZE};

/// Default chunk size: 24 MiB, under a 25 MB per-file upload limit.
pub const DEFAULT_CHUNK_SIZE: u64 = 24 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub chunk_size: u64,
    pub filters: Filters,
    /// Remove an earlier run's header and chunks instead of refusing.
    pub overwrite: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, filters: Filters::default(), overwrite: false }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub header: Header,
    pub header_path: PathBuf,
    pub chunks: Vec<PathBuf>,
    pub elapsed: Duration,
}

pub struct Encoder;

impl Encoder {
    pub fn encode(input: &Path, output: &Path, cfg: &EncoderConfig) -> Result<EncodeReport> {
        let t0 = Instant::now();
        if cfg.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1 byte".into()));
        }

        fs::create_dir_all(output).map_err(|e| Error::write(output, e))?;
        let out_can = fs::canonicalize(output).map_err(|e| Error::read(output, e))?;

        // 1) Clear the last run first so it is never discovered as input
        clear_artifacts(output, cfg.overwrite)?;

        // 2) Discover and plan the layout from file sizes
        let files = discover(input, &cfg.filters, Some(&out_can))?;
        let header = Header::plan(cfg.chunk_size, files.iter().map(|f| (f.name.clone(), f.size)))?;
        info!(
            "packing {} file(s), {} bytes into {} chunk(s) of {} bytes",
            header.entries.len(),
            header.total_bytes,
            header.chunk_count,
            header.chunk_size
        );

        // 3) Stream every file into the chunk writer
        let mut writer = ChunkWriter::new(output, cfg.chunk_size, chunk_digits(header.chunk_count));
        let mut buf = vec![0u8; IO_BUF_SIZE];
        for file in &files {
            stream_file(&mut writer, file, &mut buf)?;
            debug!("chunked {:?} as {:?}", file.path, file.name);
        }
        let chunks = writer.finish()?;
        debug_assert_eq!(chunks.len() as u64, header.chunk_count);

        // 4) Header last: its presence marks a complete run
        let bytes = header::serialize(&header)?;
        if bytes.len() as u64 > header.chunk_size {
            warn!(
                "header is {} bytes, larger than the {} byte chunk size",
                bytes.len(),
                header.chunk_size
            );
        }
        let hpath = header_path(output);
        fs::write(&hpath, &bytes).map_err(|e| Error::write(&hpath, e))?;

        Ok(EncodeReport { header, header_path: hpath, chunks, elapsed: t0.elapsed() })
    }
}

/// Remove (or refuse on) a previous run's header and chunk files; anything
/// else in `dir` is left alone.
fn clear_artifacts(dir: &Path, overwrite: bool) -> Result<()> {
    let mut stale = Vec::new();
    let hpath = header_path(dir);
    if fs::symlink_metadata(&hpath).is_ok() {
        stale.push(hpath);
    }
    let mut chunks = Vec::new();
    for ent in fs::read_dir(dir).map_err(|e| Error::read(dir, e))? {
        let ent = ent.map_err(|e| Error::read(dir, e))?;
        let is_chunk = ent.file_name().to_str().and_then(parse_chunk_name).is_some();
        let is_file = ent.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_chunk && is_file {
            chunks.push(ent.path());
        }
    }
    chunks.sort();
    stale.extend(chunks);
    if stale.is_empty() {
        return Ok(());
    }
    if !overwrite {
        return Err(Error::OutputExists { dir: dir.to_path_buf() });
    }
    for p in &stale {
        fs::remove_file(p).map_err(|e| Error::write(p, e))?;
    }
    info!("removed {} artifact(s) from a previous run in {:?}", stale.len(), dir);
    Ok(())
}

fn stream_file(writer: &mut ChunkWriter, file: &InputFile, buf: &mut [u8]) -> Result<()> {
    let f = File::open(&file.path).map_err(|e| Error::read(&file.path, e))?;
    let mut src = f.take(file.size);
    let mut copied = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::read(&file.path, e)),
        };
        writer.write(&buf[..n])?;
        copied += n as u64;
    }
    if copied != file.size {
        return Err(Error::read(
            &file.path,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while encoding: got {} of {} bytes", copied, file.size),
            ),
        ));
    }
    let mut tail = [0u8; 1];
    let extra = src.into_inner().read(&mut tail).map_err(|e| Error::read(&file.path, e))?;
    if extra != 0 {
        return Err(Error::read(
            &file.path,
            io::Error::new(io::ErrorKind::InvalidData, "file grew while encoding"),
        ));
    }
    Ok(())
}

struct OpenChunk {
    path: PathBuf,
    out: BufWriter<File>,
    filled: u64,
}

/// Cuts the logical stream into `chunk-NN` files of exactly `chunk_size`
/// bytes. A chunk file is only created once there is a byte to put in it.
struct ChunkWriter {
    dir: PathBuf,
    chunk_size: u64,
    digits: usize,
    current: Option<OpenChunk>,
    written: Vec<PathBuf>,
}

impl ChunkWriter {
    fn new(dir: &Path, chunk_size: u64, digits: usize) -> Self {
        Self { dir: dir.to_path_buf(), chunk_size, digits, current: None, written: Vec::new() }
    }

    fn open_next(&self) -> Result<OpenChunk> {
        let path = self.dir.join(chunk_name(self.written.len() as u64, self.digits));
        let f = File::create(&path).map_err(|e| Error::write(&path, e))?;
        Ok(OpenChunk { path, out: BufWriter::new(f), filled: 0 })
    }

    fn write(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let mut cur = match self.current.take() {
                Some(c) => c,
                None => self.open_next()?,
            };
            let room = (self.chunk_size - cur.filled).min(data.len() as u64) as usize;
            cur.out.write_all(&data[..room]).map_err(|e| Error::write(&cur.path, e))?;
            cur.filled += room as u64;
            data = &data[room..];
            if cur.filled == self.chunk_size {
                self.close(cur)?;
            } else {
                self.current = Some(cur);
            }
        }
        Ok(())
    }

    fn close(&mut self, cur: OpenChunk) -> Result<()> {
        let OpenChunk { path, out, filled } = cur;
        let f = out.into_inner().map_err(|e| Error::write(&path, e.into_error()))?;
        f.sync_all().map_err(|e| Error::write(&path, e))?;
        debug!("filled chunk {:?} ({} bytes)", path, filled);
        self.written.push(path);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Some(cur) = self.current.take() {
            self.close(cur)?;
        }
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_splits_across_calls_without_trailing_chunk() {
        let td = tempfile::tempdir().unwrap();
        let mut w = ChunkWriter::new(td.path(), 4, 2);
        w.write(b"abc").unwrap();
        w.write(b"defgh").unwrap();
        let chunks = w.finish().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(fs::read(td.path().join("chunk-00")).unwrap(), b"abcd");
        assert_eq!(fs::read(td.path().join("chunk-01")).unwrap(), b"efgh");
        assert!(!td.path().join("chunk-02").exists());
    }

    #[test]
    fn writer_with_no_data_creates_nothing() {
        let td = tempfile::tempdir().unwrap();
        let mut w = ChunkWriter::new(td.path(), 4, 2);
        w.write(&[]).unwrap();
        assert!(w.finish().unwrap().is_empty());
        assert_eq!(fs::read_dir(td.path()).unwrap().count(), 0);
    }
}
