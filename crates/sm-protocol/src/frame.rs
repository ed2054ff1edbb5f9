//! Frame completion rules and checksum
//!
//! Host frames and ASCII responses are complete at the CR terminator.
//! Binary responses carry their own length:
//!
//! ```text
//! <ack><CR><length>,<payload bytes...><checksum>
//! ```
//!
//! where `<length>` is the ASCII decimal payload byte count and
//! `<checksum>` is the 8-bit sum of the payload bytes. The two ack bytes
//! are not part of the block; completion is judged on the bytes after
//! them.

use crate::error::DecodeError;

/// Frame terminator byte (carriage return)
pub const TERMINATOR: u8 = 0x0D;

/// Acknowledgement code reported by the instrument after every command
pub const ACK_OK: u8 = b'0';

/// Parsed `<length>,` prefix of a binary block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLength {
    /// Declared payload byte count
    pub payload: usize,
    /// Number of ASCII digits in the length field
    pub digits: usize,
}

impl TransferLength {
    /// Total block size: length digits, comma, payload, checksum byte
    pub fn block_len(&self) -> usize {
        self.digits + 1 + self.payload + 1
    }
}

/// Parse the declared length of a binary block
///
/// `block` is the byte run after the 2-byte ack prefix. Returns
/// `Ok(None)` while no comma has arrived yet; a comma with a non-decimal
/// run in front of it is an error the caller downgrades to "keep
/// waiting".
pub fn transfer_length(block: &[u8]) -> Result<Option<TransferLength>, DecodeError> {
    let Some(comma) = block.iter().position(|&b| b == b',') else {
        return Ok(None);
    };

    let digits = &block[..comma];
    let text: String = digits.iter().map(|&b| char::from(b)).collect();
    let payload = text
        .parse::<usize>()
        .map_err(|_| DecodeError::InvalidLength(text))?;

    Ok(Some(TransferLength {
        payload,
        digits: comma,
    }))
}

/// Whether a CR-terminated frame is complete after the given byte
pub fn ascii_complete(last: u8) -> bool {
    last == TERMINATOR
}

/// 8-bit checksum: sum of all byte values modulo 256
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}
