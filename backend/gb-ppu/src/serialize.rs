//! Savestate encoding

use bincode::config::{Fixint, LittleEndian};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("error saving state: {source}")]
    Serialization {
        #[from]
        source: EncodeError,
    },
    #[error("error loading state: {source}")]
    Deserialization {
        #[from]
        source: DecodeError,
    },
    #[error("savestate has {count} unexpected trailing bytes")]
    TrailingBytes { count: usize },
    #[error("savestate field '{field}' has out-of-range value {value}")]
    InvalidField { field: &'static str, value: u64 },
}

const BINCODE_CONFIG: bincode::config::Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_little_endian().with_fixed_int_encoding();

pub(crate) fn save_state<T: Encode>(state: &T) -> Result<Vec<u8>, SaveStateError> {
    let bytes = bincode::encode_to_vec(state, BINCODE_CONFIG)?;

    log::info!("Saved state ({} bytes)", bytes.len());

    Ok(bytes)
}

pub(crate) fn load_state<T: Decode<()>>(bytes: &[u8]) -> Result<T, SaveStateError> {
    let (state, bytes_read) = bincode::decode_from_slice(bytes, BINCODE_CONFIG)?;
    if bytes_read != bytes.len() {
        return Err(SaveStateError::TrailingBytes { count: bytes.len() - bytes_read });
    }

    log::info!("Loaded state ({bytes_read} bytes)");

    Ok(state)
}
