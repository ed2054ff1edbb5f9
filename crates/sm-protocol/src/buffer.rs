//! Directional byte buffering
//!
//! The decoder keeps one buffer per transfer direction. Each buffered byte
//! carries its original position range so annotations can point back into
//! the source stream without re-scanning.

/// Transfer direction of a byte on the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Host to instrument (commands)
    #[cfg_attr(feature = "serde", serde(rename = "tx"))]
    Tx,
    /// Instrument to host (acknowledgements and responses)
    #[cfg_attr(feature = "serde", serde(rename = "rx"))]
    Rx,
}

impl Direction {
    /// Returns a short human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
        }
    }
}

/// One byte from the underlying stream, tagged with direction and position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteEvent {
    /// Start position in the source stream (e.g. sample number)
    pub start: u64,
    /// End position in the source stream
    pub end: u64,
    /// Transfer direction
    #[cfg_attr(feature = "serde", serde(rename = "dir"))]
    pub direction: Direction,
    /// The byte value
    pub value: u8,
}

/// A buffered byte with its position range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRecord {
    /// The byte value
    pub value: u8,
    /// Start position in the source stream
    pub start: u64,
    /// End position in the source stream
    pub end: u64,
}

impl ByteRecord {
    /// The byte decoded as a character (Latin-1, matching the wire encoding)
    pub fn ch(&self) -> char {
        char::from(self.value)
    }
}

/// Ordered byte accumulation for one transfer direction
///
/// Holds the raw [`ByteRecord`]s plus a derived character string. The
/// string is always the in-order concatenation of the buffered byte
/// values; the buffer only ever grows until [`DirectionBuffer::clear`].
#[derive(Debug, Default)]
pub struct DirectionBuffer {
    records: Vec<ByteRecord>,
    text: String,
}

impl DirectionBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(64),
            text: String::with_capacity(64),
        }
    }

    /// Append one byte
    pub fn push(&mut self, event: &ByteEvent) {
        let record = ByteRecord {
            value: event.value,
            start: event.start,
            end: event.end,
        };
        self.text.push(record.ch());
        self.records.push(record);
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All buffered records in arrival order
    pub fn records(&self) -> &[ByteRecord] {
        &self.records
    }

    /// The record at index `i`
    pub fn get(&self, i: usize) -> Option<&ByteRecord> {
        self.records.get(i)
    }

    /// The most recently appended record
    pub fn last(&self) -> Option<&ByteRecord> {
        self.records.last()
    }

    /// The buffered bytes as characters
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw byte values for the records in `range` (for checksumming)
    pub fn values(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        self.records[range].iter().map(|r| r.value).collect()
    }

    /// Position span from the start of record `first` to the end of
    /// record `last` (inclusive)
    pub fn span(&self, first: usize, last: usize) -> Option<(u64, u64)> {
        Some((self.records.get(first)?.start, self.records.get(last)?.end))
    }

    /// Discard all buffered bytes
    pub fn clear(&mut self) {
        self.records.clear();
        self.text.clear();
    }
}
