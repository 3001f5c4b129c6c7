pub mod decode;
pub mod discover;
pub mod encode;
pub mod error;
pub mod header;
pub mod inspect;
pub mod layout;
pub mod path_safety;

pub use decode::{DecodeReport, Decoder, DecoderConfig};
pub use encode::{EncodeReport, Encoder, EncoderConfig, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
pub use header::{FileEntry, Header};
