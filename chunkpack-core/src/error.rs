use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode entry {name:?} in header: {reason}")]
    Format { name: String, reason: String },

    #[error("malformed header {path:?}: {reason}")]
    MalformedHeader { path: PathBuf, reason: String },

    #[error("no header file found in {dir:?}")]
    MissingHeader { dir: PathBuf },

    #[error("incomplete chunk set in {dir:?}: {reason}")]
    MissingChunk { dir: PathBuf, reason: String },

    #[error("corrupt chunk {path:?}: {reason}")]
    CorruptChunk { path: PathBuf, reason: String },

    #[error("unsafe entry name {name:?}: {reason}")]
    UnsafePath { name: String, reason: String },

    #[error("invalid input {path:?}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("output directory {dir:?} already holds chunk artifacts (overwrite not enabled)")]
    OutputExists { dir: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Read { path: path.into(), source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Write { path: path.into(), source }
    }
}
