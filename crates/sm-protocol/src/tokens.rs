//! Parameter and response field tokenizing
//!
//! Splits a buffered byte run on a direction-specific separator set.
//! Consecutive separator bytes coalesce into one separator token and
//! consecutive data bytes into one data token, so `"5,,6"` yields
//! data, separator, data.

use crate::buffer::ByteRecord;

/// Separators between host-side command parameters: tab, space, comma
pub const HOST_SEPARATORS: &[u8] = &[0x09, b' ', b','];

/// Separators between instrument-side response fields: comma only
pub const DEVICE_SEPARATORS: &[u8] = &[b','];

/// Kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of non-separator bytes
    Data,
    /// A run of separator bytes
    Separator,
}

/// A coalesced run of bytes with its position span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Data or separator
    pub kind: TokenKind,
    /// The run decoded as characters
    pub text: String,
    /// Start position of the first byte
    pub start: u64,
    /// End position of the last byte
    pub end: u64,
}

/// Tokenize a byte run against a separator set
pub fn tokenize(records: &[ByteRecord], separators: &[u8]) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for record in records {
        let kind = if separators.contains(&record.value) {
            TokenKind::Separator
        } else {
            TokenKind::Data
        };

        match tokens.last_mut() {
            Some(last) if last.kind == kind => {
                last.text.push(record.ch());
                last.end = record.end;
            }
            _ => tokens.push(Token {
                kind,
                text: record.ch().to_string(),
                start: record.start,
                end: record.end,
            }),
        }
    }
    tokens
}
