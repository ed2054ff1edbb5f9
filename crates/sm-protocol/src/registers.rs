//! Status and error register decoding
//!
//! The `IS` and `ST` queries return a register whose individual bits each
//! signal an independent condition. The bit tables are fixed per query.

use crate::registry::CommandId;

/// Mapping from one register bit to its condition description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBit {
    /// Bit position, 0-based
    pub bit: u8,
    /// Condition signaled when the bit is set
    pub desc: &'static str,
}

/// Bits of the `IS` (instrument status) register
pub const INSTRUMENT_STATUS: &[RegisterBit] = &[
    RegisterBit { bit: 0, desc: "Hardware settled" },
    RegisterBit { bit: 1, desc: "Acquisition armed" },
    RegisterBit { bit: 2, desc: "Acquisition triggered" },
    RegisterBit { bit: 3, desc: "Acquisition busy" },
    RegisterBit { bit: 4, desc: "WAVEFORM A memory filled" },
    RegisterBit { bit: 5, desc: "WAVEFORM B memory filled" },
    RegisterBit { bit: 6, desc: "WAVEFORM A+/-B memory filled" },
    RegisterBit { bit: 7, desc: "Math function ready" },
    RegisterBit { bit: 8, desc: "Numeric results available" },
    RegisterBit { bit: 9, desc: "Hold mode active" },
];

/// Bits of the `ST` (error status) register
pub const ERROR_STATUS: &[RegisterBit] = &[
    RegisterBit { bit: 0, desc: "Illegal command" },
    RegisterBit { bit: 1, desc: "Wrong parameter data format" },
    RegisterBit { bit: 2, desc: "Parameter out of range" },
    RegisterBit { bit: 3, desc: "Instruction not valid in present state" },
    RegisterBit { bit: 4, desc: "Called function not implemented" },
    RegisterBit { bit: 5, desc: "Invalid number of parameters" },
    RegisterBit { bit: 6, desc: "Wrong number of data bits" },
    RegisterBit { bit: 9, desc: "Conflicting instrument settings" },
    RegisterBit { bit: 14, desc: "Checksum error" },
];

/// Select the register table for the query command that produced the field
pub fn table_for(command: CommandId) -> Option<&'static [RegisterBit]> {
    match command {
        CommandId::InstrumentStatus => Some(INSTRUMENT_STATUS),
        CommandId::StatusQuery => Some(ERROR_STATUS),
        _ => None,
    }
}

/// Build a register value from 1-2 response bytes
///
/// The first byte carries bits 0-7, the second bits 8-15.
pub fn register_value(bytes: &[u8]) -> u16 {
    let low = bytes.first().copied().unwrap_or(0) as u16;
    let high = bytes.get(1).copied().unwrap_or(0) as u16;
    low | (high << 8)
}

/// Decode a register value against a bit table
///
/// Set bits contribute their descriptions, comma-joined in table order.
/// An all-clear register yields a fixed message.
pub fn decode_register(value: u16, table: &[RegisterBit]) -> String {
    let messages: Vec<&str> = table
        .iter()
        .filter(|rb| rb.bit < 16 && value & (1 << rb.bit) != 0)
        .map(|rb| rb.desc)
        .collect();

    if messages.is_empty() {
        "Register empty".to_string()
    } else {
        messages.join(", ")
    }
}
