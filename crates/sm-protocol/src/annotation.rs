//! Annotation output model
//!
//! Every decoded token, framing byte, and protocol violation is reported
//! as an [`Annotation`]: a position range, a category, and one or more
//! label strings ordered from most verbose to least verbose. Consumers
//! pick the longest label that fits their display.

/// Category of an annotation
///
/// The categories mirror the protocol structure: command layer, parameter
/// detail layer, response layer, and per-direction framing/error markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnnotationKind {
    /// Two-letter command code
    Command,
    /// One command parameter
    Parameter,
    /// Span covering all parameters of a command
    ParameterGroup,
    /// Parameter separator (tab, space, or comma)
    Separator,
    /// Command terminator (CR)
    TxTerminator,
    /// Response terminator (CR)
    RxTerminator,
    /// Acknowledgement code
    Ack,
    /// Host byte arrived while the instrument should be talking
    TxError,
    /// Instrument byte arrived while the host should be talking
    RxError,
    /// Response field separator (comma)
    RxSeparator,
    /// One response field
    RxDetail,
    /// Span covering a whole response payload
    ResponseGroup,
    /// Verified checksum on a host frame
    TxChecksumOk,
    /// Verified checksum on an instrument frame
    RxChecksumOk,
    /// Checksum mismatch on a host frame
    TxChecksumError,
    /// Checksum mismatch on an instrument frame
    RxChecksumError,
    /// Declared length field of a host binary block
    TxLength,
    /// Declared length field of an instrument binary block
    RxLength,
}

/// One labeled interval over the source stream
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    /// Start position in the source stream
    pub start: u64,
    /// End position in the source stream
    pub end: u64,
    /// Category
    pub kind: AnnotationKind,
    /// Label variants, most verbose first
    pub labels: Vec<String>,
}

impl Annotation {
    /// Create an annotation from a position span and label variants
    pub fn new(span: (u64, u64), kind: AnnotationKind, labels: Vec<String>) -> Self {
        Self {
            start: span.0,
            end: span.1,
            kind,
            labels,
        }
    }

    /// The most verbose label
    pub fn label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or("")
    }
}
