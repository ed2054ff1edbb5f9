//! Error types for protocol decoding

use thiserror::Error;

/// Errors that can occur while decoding protocol data
///
/// None of these abort a decode session. The decoder absorbs every error
/// into either an error annotation or a "wait for more bytes" outcome and
/// resynchronizes on the next frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Binary length field is not a decimal integer
    #[error("invalid length field: {0:?}")]
    InvalidLength(String),
}
