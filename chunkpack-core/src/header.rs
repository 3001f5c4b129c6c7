//! The `header` manifest: which files live in the logical stream, where, and
//! how the stream was cut into chunks.
//!
//! The on-disk form is pretty-printed JSON with a fixed field order, so the
//! same header always serializes to the same bytes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Fixed file name of the manifest inside a chunk directory.
pub const HEADER_FILE_NAME: &str = "header";
pub const HEADER_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    /// Relative, `/`-separated path of the original file.
    pub name: String,
    pub size: u64,
    /// Start of this file's bytes in the logical stream.
    pub offset: u64,
}

impl FileEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub version: u32,
    pub chunk_size: u64,
    pub total_bytes: u64,
    pub chunk_count: u64,
    pub entries: Vec<FileEntry>,
}

/// A broken header invariant, optionally tied to one entry.
struct Violation {
    name: Option<String>,
    reason: String,
}

impl Violation {
    fn header(reason: impl Into<String>) -> Self {
        Self { name: None, reason: reason.into() }
    }

    fn entry(name: &str, reason: impl Into<String>) -> Self {
        Self { name: Some(name.to_string()), reason: reason.into() }
    }

    fn into_format(self) -> Error {
        Error::Format { name: self.name.unwrap_or_default(), reason: self.reason }
    }

    fn into_malformed(self, path: &Path) -> Error {
        let reason = match self.name {
            Some(name) => format!("entry {:?}: {}", name, self.reason),
            None => self.reason,
        };
        Error::MalformedHeader { path: path.to_path_buf(), reason }
    }
}

/// Number of chunks needed for `total` bytes; zero bytes need zero chunks.
pub fn chunks_for(total: u64, chunk_size: u64) -> u64 {
    total.div_ceil(chunk_size)
}

impl Header {
    /// Lay out `files` back to back in the given order and build the header.
    pub fn plan<I>(chunk_size: u64, files: I) -> Result<Header>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1 byte".into()));
        }
        let mut entries = Vec::new();
        let mut offset = 0u64;
        for (name, size) in files {
            let next = offset.checked_add(size).ok_or_else(|| Error::Format {
                name: name.clone(),
                reason: "stream length overflows u64".into(),
            })?;
            entries.push(FileEntry { name, size, offset });
            offset = next;
        }
        let header = Header {
            version: HEADER_VERSION,
            chunk_size,
            total_bytes: offset,
            chunk_count: chunks_for(offset, chunk_size),
            entries,
        };
        header.check_encodable().map_err(Violation::into_format)?;
        Ok(header)
    }

    /// Expected byte length of chunk `index`; only the last one may be short.
    pub fn chunk_len(&self, index: u64) -> u64 {
        if index + 1 < self.chunk_count {
            self.chunk_size
        } else if index + 1 == self.chunk_count {
            self.total_bytes - self.chunk_size * index
        } else {
            0
        }
    }

    /// Structural invariants every parsed header must satisfy.
    fn check_structure(&self) -> std::result::Result<(), Violation> {
        if self.version != HEADER_VERSION {
            return Err(Violation::header(format!("unsupported version {}", self.version)));
        }
        if self.chunk_size == 0 {
            return Err(Violation::header("chunk_size must be at least 1"));
        }
        let mut names: HashSet<&str> = HashSet::with_capacity(self.entries.len());
        let mut running = 0u64;
        for e in &self.entries {
            if e.name.is_empty() {
                return Err(Violation::header("entry with empty name"));
            }
            if !names.insert(e.name.as_str()) {
                return Err(Violation::entry(&e.name, "duplicate name"));
            }
            if e.offset != running {
                return Err(Violation::entry(
                    &e.name,
                    format!("offset {} does not follow previous entry (expected {})", e.offset, running),
                ));
            }
            running = running
                .checked_add(e.size)
                .ok_or_else(|| Violation::entry(&e.name, "stream length overflows u64"))?;
        }
        // "a" cannot be both a file and the directory holding "a/b".
        for e in &self.entries {
            let mut prefix = e.name.as_str();
            while let Some(pos) = prefix.rfind('/') {
                prefix = &prefix[..pos];
                if names.contains(prefix) {
                    return Err(Violation::entry(
                        &e.name,
                        format!("parent {:?} is also a file entry", prefix),
                    ));
                }
            }
        }
        if self.total_bytes != running {
            return Err(Violation::header(format!(
                "total_bytes {} does not match sum of entry sizes {}",
                self.total_bytes, running
            )));
        }
        let expected_chunks = chunks_for(running, self.chunk_size);
        if self.chunk_count != expected_chunks {
            return Err(Violation::header(format!(
                "chunk_count {} does not match {} bytes at chunk_size {} (expected {})",
                self.chunk_count, running, self.chunk_size, expected_chunks
            )));
        }
        Ok(())
    }

    /// Structure plus the stricter name rules applied when writing.
    fn check_encodable(&self) -> std::result::Result<(), Violation> {
        for e in &self.entries {
            check_name(&e.name).map_err(|reason| Violation::entry(&e.name, reason))?;
        }
        self.check_structure()
    }
}

fn check_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("empty name".into());
    }
    if name.contains('\0') {
        return Err("contains a NUL byte".into());
    }
    if name.starts_with('/') {
        return Err("absolute path".into());
    }
    for seg in name.split('/') {
        match seg {
            "" => return Err("empty path segment".into()),
            "." | ".." => return Err(format!("relative segment {:?}", seg)),
            _ => {}
        }
    }
    Ok(())
}

pub fn serialize(header: &Header) -> Result<Vec<u8>> {
    header.check_encodable().map_err(Violation::into_format)?;
    let mut out = serde_json::to_vec_pretty(header)
        .map_err(|e| Error::Format { name: String::new(), reason: e.to_string() })?;
    out.push(b'\n');
    Ok(out)
}

pub fn deserialize(bytes: &[u8]) -> Result<Header> {
    deserialize_at(bytes, Path::new(HEADER_FILE_NAME))
}

fn deserialize_at(bytes: &[u8], path: &Path) -> Result<Header> {
    let header: Header = serde_json::from_slice(bytes).map_err(|e| Error::MalformedHeader {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    header.check_structure().map_err(|v| v.into_malformed(path))?;
    Ok(header)
}

pub fn header_path(dir: &Path) -> PathBuf {
    dir.join(HEADER_FILE_NAME)
}

/// Read and validate `dir/header`.
pub fn read_header(dir: &Path) -> Result<Header> {
    let path = header_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::MissingHeader { dir: dir.to_path_buf() })
        }
        Err(e) => return Err(Error::read(&path, e)),
    };
    deserialize_at(&bytes, &path)
}

pub fn write_header(dir: &Path, header: &Header) -> Result<PathBuf> {
    let path = header_path(dir);
    let bytes = serialize(header)?;
    std::fs::write(&path, &bytes).map_err(|e| Error::write(&path, e))?;
    Ok(path)
}
