//! Protocol state machine
//!
//! The decoder consumes one direction-tagged byte per call and emits
//! annotations as frames complete. It tracks a single exchange at a time:
//! which direction may talk, which command is active, and how far through
//! the command's flow pattern the exchange has progressed. When the flow
//! is satisfied (or an error acknowledge truncates it) all per-exchange
//! state is dropped and the decoder is immediately ready for the next
//! command.
//!
//! Buffers are never cleared mid-cycle: the acknowledgement and response
//! frames of one command accumulate in the same direction buffer, and
//! per-frame offsets index into it. This mirrors the wire reality that a
//! binary response block is judged complete relative to the ack bytes in
//! front of it.

use std::ops::Range;

use tracing::{debug, warn};

use crate::annotation::{Annotation, AnnotationKind};
use crate::buffer::{ByteEvent, Direction, DirectionBuffer};
use crate::frame::{self, TransferLength, ACK_OK, TERMINATOR};
use crate::registers;
use crate::registry::{self, CommandDescriptor, CommandId, Phase, ResponseHandler, TransferKind};
use crate::tokens::{self, TokenKind};
use crate::Variant;

/// Who is expected to talk next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    /// Waiting for command bytes from the host
    #[default]
    AwaitingHostBytes,
    /// Waiting for acknowledge/response bytes from the instrument
    AwaitingDeviceBytes,
    /// A frame just completed and is being dispatched
    Processing,
}

/// Mutable state of the exchange currently being decoded
#[derive(Debug, Default)]
struct ExchangeState {
    state: State,
    /// Active command, fixed once the first host frame is classified
    descriptor: Option<&'static CommandDescriptor>,
    /// The two code characters as actually sent (labels unknown commands)
    code: String,
    /// Flow phases satisfied so far
    progress: Vec<Phase>,
    /// Set when the cycle is over; triggers the end-of-event reset
    reset_required: bool,
    /// Declared length of the pending binary block, once parsed
    binary_block: Option<TransferLength>,
    /// The binary length field was unparseable; stop retrying
    binary_length_invalid: bool,
    /// Index into the TX buffer where the current frame began
    tx_frame_start: usize,
    /// Index into the RX buffer where the current frame began
    rx_frame_start: usize,
}

/// Streaming ScopeMeter protocol decoder
///
/// Feed byte events in arrival order via [`Decoder::process`]; each call
/// returns the annotations produced by that byte (usually none until a
/// frame terminator arrives). The decoder never fails: protocol
/// violations become error annotations and the state machine
/// resynchronizes on the next expected frame.
#[derive(Debug, Default)]
pub struct Decoder {
    variant: Variant,
    exchange: ExchangeState,
    tx: DirectionBuffer,
    rx: DirectionBuffer,
}

impl Decoder {
    /// Create a decoder for the given instrument variant
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            exchange: ExchangeState::default(),
            tx: DirectionBuffer::new(),
            rx: DirectionBuffer::new(),
        }
    }

    /// The active instrument variant
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Drop all per-exchange state and buffered bytes
    pub fn reset(&mut self) {
        self.exchange = ExchangeState::default();
        self.tx.clear();
        self.rx.clear();
    }

    /// Process one byte event, returning the annotations it produced
    pub fn process(&mut self, event: ByteEvent) -> Vec<Annotation> {
        let mut out = Vec::new();

        // A byte for the direction not currently expected is annotated
        // and dropped; buffers and state are untouched.
        match (self.exchange.state, event.direction) {
            (State::AwaitingHostBytes, Direction::Rx) => {
                debug!(start = event.start, "RX byte while awaiting host");
                out.push(Annotation::new(
                    (event.start, event.end),
                    AnnotationKind::RxError,
                    vec!["Bad/Unknown RX".into(), "Bad RX".into(), "BRX".into()],
                ));
                return out;
            }
            (State::AwaitingDeviceBytes, Direction::Tx) => {
                debug!(start = event.start, "TX byte while awaiting device");
                out.push(Annotation::new(
                    (event.start, event.end),
                    AnnotationKind::TxError,
                    vec!["Bad/Unknown TX".into(), "Bad TX".into(), "BTX".into()],
                ));
                return out;
            }
            _ => {}
        }

        match event.direction {
            Direction::Tx => {
                self.tx.push(&event);
                if frame::ascii_complete(event.value) {
                    self.exchange.state = State::Processing;
                }
            }
            Direction::Rx => {
                self.rx.push(&event);
                let complete = if self.binary_block_expected() {
                    self.binary_block_complete()
                } else {
                    frame::ascii_complete(event.value)
                };
                if complete {
                    self.exchange.state = State::Processing;
                }
            }
        }

        if self.exchange.state == State::Processing {
            match event.direction {
                Direction::Tx => self.process_host_frame(&mut out),
                Direction::Rx => self.process_device_frame(&mut out),
            }
        }

        if self.exchange.reset_required {
            self.reset();
        }

        out
    }

    /// Whether the current RX bytes are a length-prefixed binary block
    ///
    /// Binary framing only applies to the combined ack+response block of a
    /// binary-response command, and only while the ack is `0`: an error
    /// acknowledge is followed by no payload, so it is framed by its CR.
    fn binary_block_expected(&self) -> bool {
        let Some(desc) = self.exchange.descriptor else {
            return false;
        };
        desc.transfer == TransferKind::Binary
            && self.exchange.progress == [Phase::Transmit]
            && self
                .rx
                .get(self.exchange.rx_frame_start)
                .map(|r| r.value == ACK_OK)
                .unwrap_or(false)
    }

    /// Whether the binary block past the 2-byte ack prefix is complete
    fn binary_block_complete(&mut self) -> bool {
        let base = self.exchange.rx_frame_start + 2;
        if self.rx.len() <= base {
            return false;
        }
        let block = self.rx.values(base..self.rx.len());

        if self.exchange.binary_block.is_none() && !self.exchange.binary_length_invalid {
            match frame::transfer_length(&block) {
                Ok(Some(tl)) => self.exchange.binary_block = Some(tl),
                Ok(None) => return false,
                Err(e) => {
                    warn!(error = %e, "binary length field unparseable, waiting for more data");
                    self.exchange.binary_length_invalid = true;
                    return false;
                }
            }
        }

        match self.exchange.binary_block {
            Some(tl) => block.len() >= tl.block_len(),
            None => false,
        }
    }

    /// Dispatch a completed host frame
    fn process_host_frame(&mut self, out: &mut Vec<Annotation>) {
        // Classification happens once, on the first frame of the cycle.
        if self.exchange.descriptor.is_none() {
            let desc = if self.tx.len() == 1
                && self.tx.get(0).map(|r| r.value) == Some(TERMINATOR)
            {
                &registry::NONE
            } else {
                let code: String = self
                    .tx
                    .text()
                    .chars()
                    .take(2)
                    .collect::<String>()
                    .to_ascii_uppercase();
                let desc = registry::lookup(self.variant, &code);
                if desc.id == CommandId::Unknown {
                    warn!(code = %code, "unknown command code");
                }
                self.exchange.code = code;
                desc
            };
            self.exchange.descriptor = Some(desc);
        }
        let desc = self.exchange.descriptor.unwrap_or(&registry::UNKNOWN);

        if self.exchange.progress.is_empty() {
            self.annotate_command_frame(desc, out);
        } else {
            self.annotate_program_data(out);
        }

        self.exchange.progress.push(Phase::Transmit);
        self.advance(desc);
    }

    /// Annotate the first host frame: code, parameters, terminator
    fn annotate_command_frame(&self, desc: &CommandDescriptor, out: &mut Vec<Annotation>) {
        let last = self.tx.len() - 1;

        if desc.id == CommandId::None {
            if let Some(span) = self.tx.span(0, 0) {
                out.push(Annotation::new(
                    span,
                    AnnotationKind::Command,
                    vec![desc.name.to_string()],
                ));
                out.push(terminator_annotation(span, AnnotationKind::TxTerminator));
            }
            return;
        }

        let code = self.command_code(desc);
        if let Some(span) = self.tx.span(0, last.min(1)) {
            out.push(Annotation::new(
                span,
                AnnotationKind::Command,
                vec![
                    format!("{} ({})", desc.name, code),
                    desc.name.to_string(),
                    code.clone(),
                ],
            ));
        }

        if self.tx.len() > 3 {
            if let Some(span) = self.tx.span(2, last - 1) {
                out.push(Annotation::new(
                    span,
                    AnnotationKind::ParameterGroup,
                    vec![format!("{} parameters", desc.name), format!("{} param", code)],
                ));
            }
            let records = &self.tx.records()[2..last];
            let mut next_param = 0;
            for token in tokens::tokenize(records, tokens::HOST_SEPARATORS) {
                match token.kind {
                    TokenKind::Separator => out.push(Annotation::new(
                        (token.start, token.end),
                        AnnotationKind::Separator,
                        vec![token.text],
                    )),
                    TokenKind::Data => {
                        let spec = desc.parameters.get(next_param);
                        next_param += 1;
                        let name = spec.map(|s| s.name).unwrap_or("Unknown parameter");
                        let mut labels =
                            vec![format!("{}: {}", name, token.text), token.text.clone()];
                        if let Some(value_desc) =
                            spec.and_then(|s| s.values.describe(&token.text))
                        {
                            labels.insert(
                                0,
                                format!("{}: {} ({})", name, token.text, value_desc),
                            );
                        }
                        out.push(Annotation::new(
                            (token.start, token.end),
                            AnnotationKind::Parameter,
                            labels,
                        ));
                    }
                }
            }
        }

        if let Some(span) = self.tx.span(last, last) {
            out.push(terminator_annotation(span, AnnotationKind::TxTerminator));
        }
    }

    /// Annotate the second host frame of a two-stage program command
    ///
    /// Format mirrors the binary response block:
    /// `<length>,<data><checksum><CR>`. A frame without a usable length
    /// prefix is annotated as one opaque data span.
    fn annotate_program_data(&self, out: &mut Vec<Annotation>) {
        let fs = self.exchange.tx_frame_start;
        let last = self.tx.len() - 1;
        let block = self.tx.values(fs..last);

        match frame::transfer_length(&block) {
            Ok(Some(tl)) if block.len() >= tl.block_len() => {
                let comma = fs + tl.digits;
                let payload_start = comma + 1;
                let cs_index = payload_start + tl.payload;
                if let Some(span) = self.tx.span(fs, comma - 1) {
                    out.push(Annotation::new(
                        span,
                        AnnotationKind::TxLength,
                        vec![format!("Length: {}", tl.payload), tl.payload.to_string()],
                    ));
                }
                if let Some(span) = self.tx.span(comma, comma) {
                    out.push(Annotation::new(
                        span,
                        AnnotationKind::Separator,
                        vec!["Separator: ,".into(), ",".into()],
                    ));
                }
                if tl.payload > 0 {
                    if let Some(span) = self.tx.span(payload_start, cs_index - 1) {
                        out.push(Annotation::new(
                            span,
                            AnnotationKind::Parameter,
                            vec!["Waveform data".into()],
                        ));
                    }
                }
                if let Some(ann) =
                    self.checksum_annotation(Direction::Tx, payload_start..cs_index, cs_index)
                {
                    out.push(ann);
                }
            }
            _ => {
                if last > fs {
                    if let Some(span) = self.tx.span(fs, last - 1) {
                        out.push(Annotation::new(
                            span,
                            AnnotationKind::Parameter,
                            vec!["Waveform data".into()],
                        ));
                    }
                }
            }
        }

        if let Some(span) = self.tx.span(last, last) {
            out.push(terminator_annotation(span, AnnotationKind::TxTerminator));
        }
    }

    /// Dispatch a completed instrument frame
    fn process_device_frame(&mut self, out: &mut Vec<Annotation>) {
        let Some(desc) = self.exchange.descriptor else {
            self.exchange.reset_required = true;
            return;
        };

        match desc.flow.get(self.exchange.progress.len()).copied() {
            Some(Phase::Acknowledge) => {
                let fs = self.exchange.rx_frame_start;
                let Some(ack) = self.rx.get(fs).copied() else {
                    self.exchange.reset_required = true;
                    return;
                };
                let ack_ch = ack.ch();
                let status = match ack_ch {
                    '0' => "Ok",
                    '1' => "Syntax Error",
                    '2' => "Execution Error",
                    '3' => "Synchronization Error",
                    '4' => "Communication Error",
                    _ => "Unknown Acknowledge",
                };
                out.push(Annotation::new(
                    (ack.start, ack.end),
                    AnnotationKind::Ack,
                    vec![
                        format!("{} ({})", status, ack_ch),
                        status.to_string(),
                        ack_ch.to_string(),
                    ],
                ));

                let binary = self.exchange.binary_block.is_some();
                let ack_cr = if binary { fs + 1 } else { self.rx.len() - 1 };
                if self.rx.get(ack_cr).map(|r| r.value) == Some(TERMINATOR) {
                    if let Some(span) = self.rx.span(ack_cr, ack_cr) {
                        out.push(terminator_annotation(span, AnnotationKind::RxTerminator));
                    }
                }

                self.exchange.progress.push(Phase::Acknowledge);
                if ack.value != ACK_OK {
                    warn!(ack = %ack_ch, status, "error acknowledge, cycle terminated");
                    self.exchange.reset_required = true;
                    return;
                }

                if binary {
                    self.annotate_binary_response(desc, out);
                    self.exchange.progress.push(Phase::Return);
                }
                self.advance(desc);
            }
            Some(Phase::Return) => {
                self.annotate_ascii_response(desc, out);
                self.exchange.progress.push(Phase::Return);
                self.advance(desc);
            }
            _ => {
                self.exchange.reset_required = true;
            }
        }
    }

    /// Annotate a CR-terminated response frame via the command's handler
    fn annotate_ascii_response(&self, desc: &CommandDescriptor, out: &mut Vec<Annotation>) {
        let fs = self.exchange.rx_frame_start;
        let last = self.rx.len() - 1;

        if last <= fs {
            // Empty response, just a terminator.
            if let Some(span) = self.rx.span(last, last) {
                out.push(terminator_annotation(span, AnnotationKind::RxTerminator));
            }
            return;
        }

        let code = self.command_code(desc);
        if let Some(span) = self.rx.span(fs, last - 1) {
            out.push(Annotation::new(
                span,
                AnnotationKind::ResponseGroup,
                vec![format!("RX for {}", desc.name), format!("RX for {}", code)],
            ));

            match desc.handler {
                Some(ResponseHandler::Registers) => {
                    if let Some(table) = registers::table_for(desc.id) {
                        let value = registers::register_value(&self.rx.values(fs..last));
                        out.push(Annotation::new(
                            span,
                            AnnotationKind::RxDetail,
                            vec![registers::decode_register(value, table)],
                        ));
                    }
                }
                Some(ResponseHandler::Measurement) => {
                    self.annotate_measurement_fields(fs, last, out);
                }
                // Binary responses are handled together with the ack.
                Some(ResponseHandler::Binary) => {}
                Some(ResponseHandler::PlainText) | None => {
                    let text: String = self.rx.records()[fs..last].iter().map(|r| r.ch()).collect();
                    out.push(Annotation::new(span, AnnotationKind::RxDetail, vec![text]));
                }
            }
        }

        if let Some(span) = self.rx.span(last, last) {
            out.push(terminator_annotation(span, AnnotationKind::RxTerminator));
        }
    }

    /// Annotate comma-separated measurement fields of a QM response
    ///
    /// A `V` (values only) modifier on the request reduces the expected
    /// fields from type/value/unit to the value alone.
    fn annotate_measurement_fields(&self, fs: usize, last: usize, out: &mut Vec<Annotation>) {
        let field_names: &[&str] = if self.values_only_request() {
            &["Measurement value"]
        } else {
            &["Measurement type", "Measurement value", "Unit suffix"]
        };

        let mut next_field = 0;
        for token in tokens::tokenize(&self.rx.records()[fs..last], tokens::DEVICE_SEPARATORS) {
            match token.kind {
                TokenKind::Separator => out.push(Annotation::new(
                    (token.start, token.end),
                    AnnotationKind::RxSeparator,
                    vec![token.text],
                )),
                TokenKind::Data => {
                    let name = field_names
                        .get(next_field)
                        .copied()
                        .unwrap_or("Unknown response data");
                    next_field += 1;
                    out.push(Annotation::new(
                        (token.start, token.end),
                        AnnotationKind::RxDetail,
                        vec![format!("{}: {}", name, token.text), token.text],
                    ));
                }
            }
        }
    }

    /// Annotate a completed binary block: length, separator, payload, checksum
    fn annotate_binary_response(&self, desc: &CommandDescriptor, out: &mut Vec<Annotation>) {
        let Some(tl) = self.exchange.binary_block else {
            return;
        };
        let base = self.exchange.rx_frame_start + 2;
        let comma = base + tl.digits;
        let payload_start = comma + 1;
        let cs_index = payload_start + tl.payload;
        let code = self.command_code(desc);

        if let Some(span) = self.rx.span(base, self.rx.len() - 1) {
            out.push(Annotation::new(
                span,
                AnnotationKind::ResponseGroup,
                vec![format!("RX for {}", desc.name), format!("RX for {}", code)],
            ));
        }
        if let Some(span) = self.rx.span(base, comma - 1) {
            out.push(Annotation::new(
                span,
                AnnotationKind::RxLength,
                vec![format!("Length: {}", tl.payload), tl.payload.to_string()],
            ));
        }
        if let Some(span) = self.rx.span(comma, comma) {
            out.push(Annotation::new(
                span,
                AnnotationKind::RxSeparator,
                vec!["Separator: ,".into(), ",".into()],
            ));
        }
        if tl.payload > 0 {
            if let Some(span) = self.rx.span(payload_start, cs_index - 1) {
                out.push(Annotation::new(
                    span,
                    AnnotationKind::RxDetail,
                    vec![
                        format!("{} binary response", desc.name),
                        format!("{} binary RX", code),
                        "Binary".into(),
                    ],
                ));
            }
        }
        if let Some(ann) =
            self.checksum_annotation(Direction::Rx, payload_start..cs_index, cs_index)
        {
            out.push(ann);
        }
    }

    /// Verify the checksum byte at `cs_index` against the payload span
    fn checksum_annotation(
        &self,
        direction: Direction,
        payload: Range<usize>,
        cs_index: usize,
    ) -> Option<Annotation> {
        let buffer = match direction {
            Direction::Tx => &self.tx,
            Direction::Rx => &self.rx,
        };
        let actual = buffer.get(cs_index)?.value;
        let expected = frame::checksum(&buffer.values(payload));

        let (kind, result) = if expected == actual {
            match direction {
                Direction::Tx => (AnnotationKind::TxChecksumOk, "OK"),
                Direction::Rx => (AnnotationKind::RxChecksumOk, "OK"),
            }
        } else {
            warn!(
                expected,
                actual,
                direction = direction.name(),
                "checksum mismatch"
            );
            match direction {
                Direction::Tx => (AnnotationKind::TxChecksumError, "Error"),
                Direction::Rx => (AnnotationKind::RxChecksumError, "Error"),
            }
        };

        Some(Annotation::new(
            buffer.span(cs_index, cs_index)?,
            kind,
            vec![format!("Checksum {}", result), format!("Xsum {}", result)],
        ))
    }

    /// Close out the current frame and pick the next expected direction
    ///
    /// When the flow pattern is fully satisfied, flags the end-of-event
    /// reset instead. This is the only place an exchange ends normally.
    fn advance(&mut self, desc: &CommandDescriptor) {
        self.exchange.tx_frame_start = self.tx.len();
        self.exchange.rx_frame_start = self.rx.len();

        match desc.flow.get(self.exchange.progress.len()) {
            None => self.exchange.reset_required = true,
            Some(Phase::Transmit) => self.exchange.state = State::AwaitingHostBytes,
            Some(Phase::Acknowledge) | Some(Phase::Return) => {
                self.exchange.state = State::AwaitingDeviceBytes;
            }
        }
    }

    /// Wire code for labels: the table code, or the characters actually sent
    fn command_code(&self, desc: &CommandDescriptor) -> String {
        if desc.code.is_empty() {
            self.exchange.code.clone()
        } else {
            desc.code.to_string()
        }
    }

    /// Whether the request carried a trailing `V` (values only) modifier
    fn values_only_request(&self) -> bool {
        let n = self.tx.len();
        n >= 2
            && matches!(
                self.tx.get(n - 2).map(|r| r.value),
                Some(b'V') | Some(b'v')
            )
    }
}

fn terminator_annotation(span: (u64, u64), kind: AnnotationKind) -> Annotation {
    Annotation::new(span, kind, vec!["<CR>".into(), "CR".into()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut Decoder, direction: Direction, bytes: &[u8], pos: &mut u64) -> Vec<Annotation> {
        let mut out = Vec::new();
        for &value in bytes {
            let event = ByteEvent {
                start: *pos,
                end: *pos + 10,
                direction,
                value,
            };
            *pos += 10;
            out.extend(decoder.process(event));
        }
        out
    }

    #[test]
    fn classification_is_fixed_after_first_frame() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;
        let anns = feed(&mut decoder, Direction::Tx, b"id\r", &mut pos);

        let cmd = anns
            .iter()
            .find(|a| a.kind == AnnotationKind::Command)
            .unwrap();
        assert_eq!(cmd.label(), "IDENTIFICATION (ID)");
    }

    #[test]
    fn values_only_modifier_detected() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;
        feed(&mut decoder, Direction::Tx, b"QM 1 V\r", &mut pos);
        assert!(decoder.values_only_request());
    }

    #[test]
    fn lone_terminator_is_the_none_command() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;
        let anns = feed(&mut decoder, Direction::Tx, b"\r", &mut pos);

        let cmd = anns
            .iter()
            .find(|a| a.kind == AnnotationKind::Command)
            .unwrap();
        assert_eq!(cmd.label(), "Command terminator");
    }
}
