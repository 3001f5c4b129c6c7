use crate::error::{Error, Result};
use crate::header::{read_header, Header};
use crate::layout::locate_chunks;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InspectReport {
    pub header: Header,
    /// Chunk files in stream order, each checked against its expected length.
    pub chunks: Vec<PathBuf>,
}

/// Validate a chunk directory without writing anything.
pub fn inspect(dir: &Path) -> Result<InspectReport> {
    match std::fs::metadata(dir) {
        Ok(md) if md.is_dir() => {}
        Ok(_) => {
            return Err(Error::InvalidInput { path: dir.to_path_buf(), reason: "not a directory".into() })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InvalidInput { path: dir.to_path_buf(), reason: "not found".into() })
        }
        Err(e) => return Err(Error::read(dir, e)),
    }
    let header = read_header(dir)?;
    let chunks = locate_chunks(dir, &header)?;
    Ok(InspectReport { header, chunks })
}
