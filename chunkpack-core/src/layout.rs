use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::header::Header;

pub const CHUNK_PREFIX: &str = "chunk-";
const MIN_DIGITS: usize = 2;

/// Copy buffer for streaming into and out of chunk files.
pub(crate) const IO_BUF_SIZE: usize = 64 * 1024;

/// Zero-padding width that keeps `chunk_count` names in stream order when
/// sorted as plain strings.
pub fn chunk_digits(chunk_count: u64) -> usize {
    let mut n = chunk_count.saturating_sub(1);
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits.max(MIN_DIGITS)
}

/// Utility: standard chunk filename for an index
pub fn chunk_name(index: u64, digits: usize) -> String {
    format!("{}{:0width$}", CHUNK_PREFIX, index, width = digits)
}

/// `None` unless `name` is `chunk-` followed by decimal digits only;
/// `chunk-notes.txt` or `chunk-00.bak` are not chunks. A digit suffix too
/// large for `u64` is still a chunk name, just one that cannot be ordered.
pub fn parse_chunk_name(name: &str) -> Option<std::result::Result<u64, String>> {
    let suffix = name.strip_prefix(CHUNK_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(suffix.parse::<u64>().map_err(|e| format!("index {:?}: {}", suffix, e)))
}

/// Every chunk-named entry in `dir`, keyed by index. Unrelated files are
/// ignored; two names for one index, or an index past `u64`, are errors.
pub fn scan_chunks(dir: &Path) -> Result<BTreeMap<u64, PathBuf>> {
    let mut found: BTreeMap<u64, PathBuf> = BTreeMap::new();
    for ent in fs::read_dir(dir).map_err(|e| Error::read(dir, e))? {
        let ent = ent.map_err(|e| Error::read(dir, e))?;
        let path = ent.path();
        let Some(name) = ent.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let idx = match parse_chunk_name(&name) {
            None => continue,
            Some(Ok(idx)) => idx,
            Some(Err(reason)) => return Err(Error::CorruptChunk { path, reason }),
        };
        let ft = ent.file_type().map_err(|e| Error::read(&path, e))?;
        if !ft.is_file() {
            return Err(Error::CorruptChunk { path, reason: "not a regular file".into() });
        }
        if let Some(prev) = found.get(&idx) {
            return Err(Error::CorruptChunk {
                reason: format!("index {} already taken by {:?}", idx, prev),
                path,
            });
        }
        found.insert(idx, path);
    }
    Ok(found)
}

/// Check the chunks in `dir` against `header` and return their paths in
/// stream order.
pub fn locate_chunks(dir: &Path, header: &Header) -> Result<Vec<PathBuf>> {
    let mut found = scan_chunks(dir)?;
    if let Some((&idx, path)) = found.range(header.chunk_count..).next() {
        return Err(Error::CorruptChunk {
            path: path.clone(),
            reason: format!(
                "index {} is past the end of the stream ({} chunks expected)",
                idx, header.chunk_count
            ),
        });
    }
    let digits = chunk_digits(header.chunk_count);
    let mut ordered = Vec::with_capacity(header.chunk_count as usize);
    for idx in 0..header.chunk_count {
        let Some(path) = found.remove(&idx) else {
            return Err(Error::MissingChunk {
                dir: dir.to_path_buf(),
                reason: format!("{} not found", chunk_name(idx, digits)),
            });
        };
        let len = fs::metadata(&path).map_err(|e| Error::read(&path, e))?.len();
        let expected = header.chunk_len(idx);
        if len < expected {
            return Err(Error::MissingChunk {
                dir: dir.to_path_buf(),
                reason: format!("{:?} holds {} bytes, expected {}", path, len, expected),
            });
        }
        if len > expected {
            return Err(Error::CorruptChunk {
                path,
                reason: format!("holds {} bytes, expected {}", len, expected),
            });
        }
        ordered.push(path);
    }
    Ok(ordered)
}
