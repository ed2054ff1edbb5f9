//! Fluke ScopeMeter Protocol Decoder
//!
//! This crate decodes the serial remote-control protocol spoken by the
//! Fluke ScopeMeter 90 series (91/92(B)/96(B)/97/99(B)/105(B)) into
//! labeled annotations over the original byte stream.
//!
//! # Protocol
//!
//! The host sends ASCII commands with a two-letter code, optional
//! parameters, and a carriage-return terminator:
//!
//! ```text
//! RS 5<CR>
//! ```
//!
//! The instrument answers every command with a single-digit
//! acknowledgement code and a terminator (`0<CR>` on success), followed,
//! for query commands, by a response payload. Responses are either
//! CR-terminated ASCII or, for the print/screenshot queries, a
//! length-prefixed binary block with a trailing checksum:
//!
//! ```text
//! <ack><CR><length>,<payload bytes...><checksum>
//! ```
//!
//! # Usage
//!
//! The decoder is passive and fully synchronous: feed it one direction-tagged
//! byte at a time and collect the annotations it emits.
//!
//! ```rust
//! use sm_protocol::{ByteEvent, Decoder, Direction, Variant};
//!
//! let mut decoder = Decoder::new(Variant::Series90);
//! let mut annotations = Vec::new();
//!
//! for (i, &byte) in b"ID\r".iter().enumerate() {
//!     let event = ByteEvent {
//!         start: i as u64 * 10,
//!         end: i as u64 * 10 + 10,
//!         direction: Direction::Tx,
//!         value: byte,
//!     };
//!     annotations.extend(decoder.process(event));
//! }
//!
//! assert!(!annotations.is_empty());
//! ```

pub mod annotation;
pub mod buffer;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod registers;
pub mod registry;
pub mod tokens;

pub use annotation::{Annotation, AnnotationKind};
pub use buffer::{ByteEvent, ByteRecord, Direction, DirectionBuffer};
pub use decoder::Decoder;
pub use error::DecodeError;
pub use registry::{CommandDescriptor, CommandId, Phase, TransferKind};

/// Identifies which ScopeMeter model family's command table is active
///
/// Later ScopeMeter series extend the command set and register layouts;
/// the variant selects which static tables [`registry::lookup`] consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Variant {
    /// ScopeMeter 90 series: 91, 92(B), 96(B), 97, 99(B), 105(B)
    #[default]
    Series90,
}

impl Variant {
    /// Returns a human-readable name for the variant
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Series90 => "91,92(B),96(B),97,99(B),105(B)",
        }
    }
}
