//! Integration tests for the ScopeMeter protocol decoder
//!
//! These tests drive whole command/response cycles through the decoder:
//! - Flow patterns (TA, TAR, TATA) and the end-of-cycle reset
//! - Error acknowledge truncating the response phase
//! - Binary block framing and checksum verification
//! - Direction gating
//! - Parameter and response field tokenizing

use proptest::prelude::*;
use sm_protocol::{Annotation, AnnotationKind, ByteEvent, Decoder, Direction, Variant};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Feed a byte run in one direction, advancing a shared position counter
    pub fn feed(
        decoder: &mut Decoder,
        direction: Direction,
        bytes: &[u8],
        pos: &mut u64,
    ) -> Vec<Annotation> {
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

    /// Annotations of one kind
    pub fn of_kind(anns: &[Annotation], kind: AnnotationKind) -> Vec<Annotation> {
        anns.iter().filter(|a| a.kind == kind).cloned().collect()
    }

    /// Whether any annotation of the given kind exists
    pub fn has_kind(anns: &[Annotation], kind: AnnotationKind) -> bool {
        anns.iter().any(|a| a.kind == kind)
    }

    /// The most verbose label of the first annotation of the given kind
    pub fn label_of(anns: &[Annotation], kind: AnnotationKind) -> Option<String> {
        anns.iter()
            .find(|a| a.kind == kind)
            .map(|a| a.label().to_string())
    }
}

// ============================================================================
// Flow Pattern Tests
// ============================================================================

mod flow_tests {
    use super::*;
    use helpers::*;

    #[test]
    fn ta_cycle_completes_and_resets() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"RS 5\r", &mut pos);
        assert_eq!(
            label_of(&tx, AnnotationKind::Command).as_deref(),
            Some("RECALL SETUP (RS)")
        );
        assert!(has_kind(&tx, AnnotationKind::TxTerminator));

        let rx = feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        assert_eq!(
            label_of(&rx, AnnotationKind::Ack).as_deref(),
            Some("Ok (0)")
        );
        assert!(has_kind(&rx, AnnotationKind::RxTerminator));

        // The decoder is immediately ready for the next command.
        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
        assert_eq!(
            label_of(&next, AnnotationKind::Command).as_deref(),
            Some("IDENTIFICATION (ID)")
        );
    }

    #[test]
    fn tar_cycle_with_plain_text_response() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"FLUKE 97, V2.00\r", &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::ResponseGroup).as_deref(),
            Some("RX for IDENTIFICATION")
        );
        assert_eq!(
            label_of(&rx, AnnotationKind::RxDetail).as_deref(),
            Some("FLUKE 97, V2.00")
        );
        assert!(has_kind(&rx, AnnotationKind::RxTerminator));
    }

    #[test]
    fn error_ack_suppresses_response_phase() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"ST\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"1\r", &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::Ack).as_deref(),
            Some("Syntax Error (1)")
        );
        assert!(!has_kind(&rx, AnnotationKind::ResponseGroup));
        assert!(!has_kind(&rx, AnnotationKind::RxDetail));

        // Cycle reset: a fresh host command decodes cleanly.
        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
        assert!(has_kind(&next, AnnotationKind::Command));
    }

    #[test]
    fn unknown_ack_code_terminates_cycle() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"9\r", &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::Ack).as_deref(),
            Some("Unknown Acknowledge (9)")
        );
        assert!(!has_kind(&rx, AnnotationKind::ResponseGroup));
    }

    #[test]
    fn program_waveform_two_stage_cycle() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"PW 101\r", &mut pos);
        assert_eq!(
            label_of(&tx, AnnotationKind::Parameter).as_deref(),
            Some("Trace no: 101 (INPUT A)")
        );

        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);

        // Second stage: <length>,<data><checksum><CR>
        let checksum = b"abc".iter().fold(0u8, |s, &b| s.wrapping_add(b));
        let mut data = b"3,abc".to_vec();
        data.push(checksum);
        data.push(b'\r');
        let tx2 = feed(&mut decoder, Direction::Tx, &data, &mut pos);

        assert!(!has_kind(&tx2, AnnotationKind::TxError));
        assert_eq!(
            label_of(&tx2, AnnotationKind::TxLength).as_deref(),
            Some("Length: 3")
        );
        assert_eq!(
            label_of(&tx2, AnnotationKind::Parameter).as_deref(),
            Some("Waveform data")
        );
        assert_eq!(
            label_of(&tx2, AnnotationKind::TxChecksumOk).as_deref(),
            Some("Checksum OK")
        );

        let rx2 = feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        assert!(has_kind(&rx2, AnnotationKind::Ack));

        // Full TATA flow satisfied, decoder reset.
        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
    }

    #[test]
    fn none_command_is_a_lone_terminator() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"\r", &mut pos);
        assert_eq!(
            label_of(&tx, AnnotationKind::Command).as_deref(),
            Some("Command terminator")
        );

        let rx = feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        assert!(has_kind(&rx, AnnotationKind::Ack));
    }

    #[test]
    fn unknown_command_still_completes_a_cycle() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"ZZ\r", &mut pos);
        assert_eq!(
            label_of(&tx, AnnotationKind::Command).as_deref(),
            Some("Unknown command (ZZ)")
        );

        let rx = feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        assert!(has_kind(&rx, AnnotationKind::Ack));

        let next = feed(&mut decoder, Direction::Tx, b"AS\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
    }

    #[test]
    fn back_to_back_cycles_keep_positions() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"AS\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);

        let tx = feed(&mut decoder, Direction::Tx, b"AT\r", &mut pos);
        let cmd = of_kind(&tx, AnnotationKind::Command);
        assert_eq!(cmd.len(), 1);
        // Second cycle's command starts where the stream left off.
        assert_eq!(cmd[0].start, 50);
    }
}

// ============================================================================
// Direction Gating Tests
// ============================================================================

mod gating_tests {
    use super::*;
    use helpers::*;

    #[test]
    fn device_byte_while_awaiting_host_is_dropped() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let anns = feed(&mut decoder, Direction::Rx, b"0", &mut pos);
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].kind, AnnotationKind::RxError);
        assert_eq!(anns[0].label(), "Bad/Unknown RX");
        assert_eq!((anns[0].start, anns[0].end), (0, 10));

        // The host buffer is untouched: a full command still assembles.
        let tx = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert_eq!(
            label_of(&tx, AnnotationKind::Command).as_deref(),
            Some("IDENTIFICATION (ID)")
        );
    }

    #[test]
    fn host_byte_while_awaiting_device_is_dropped() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        let anns = feed(&mut decoder, Direction::Tx, b"X", &mut pos);

        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].kind, AnnotationKind::TxError);
        assert_eq!(anns[0].label(), "Bad/Unknown TX");

        // The exchange still completes.
        let rx = feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        assert!(has_kind(&rx, AnnotationKind::Ack));
    }
}

// ============================================================================
// Parameter Tokenizing Tests
// ============================================================================

mod parameter_tests {
    use super::*;
    use helpers::*;

    #[test]
    fn recall_setup_parameter_naming() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"RS 5\r", &mut pos);

        let separators = of_kind(&tx, AnnotationKind::Separator);
        assert_eq!(separators.len(), 1);
        assert_eq!(separators[0].label(), " ");

        let params = of_kind(&tx, AnnotationKind::Parameter);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].label(), "Setup register: 5 (Stored setup 5)");
    }

    #[test]
    fn excess_parameters_are_labeled_unknown() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"RS 5 9\r", &mut pos);
        let params = of_kind(&tx, AnnotationKind::Parameter);
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].label(), "Unknown parameter: 9");
    }

    #[test]
    fn program_communication_parameters() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"PC 1200,N,8,1\r", &mut pos);
        let params = of_kind(&tx, AnnotationKind::Parameter);
        let labels: Vec<&str> = params.iter().map(|a| a.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Baud rate: 1200",
                "Parity: N (None)",
                "Data bits: 8",
                "Stop bits: 1",
            ]
        );
        assert!(has_kind(&tx, AnnotationKind::ParameterGroup));
    }

    #[test]
    fn bare_command_has_no_parameter_group() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        let tx = feed(&mut decoder, Direction::Tx, b"AS\r", &mut pos);
        assert!(!has_kind(&tx, AnnotationKind::ParameterGroup));
        assert!(!has_kind(&tx, AnnotationKind::Parameter));
    }
}

// ============================================================================
// Response Decoding Tests
// ============================================================================

mod response_tests {
    use super::*;
    use helpers::*;

    #[test]
    fn instrument_status_register_decode() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"IS\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, &[8, b'\r'], &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::RxDetail).as_deref(),
            Some("Acquisition busy")
        );
    }

    #[test]
    fn empty_register_message() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"ST\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, &[0, b'\r'], &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::RxDetail).as_deref(),
            Some("Register empty")
        );
    }

    #[test]
    fn measurement_response_three_fields() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QM 1\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"dV,1.23,V\r", &mut pos);

        let details = of_kind(&rx, AnnotationKind::RxDetail);
        let labels: Vec<&str> = details.iter().map(|a| a.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Measurement type: dV",
                "Measurement value: 1.23",
                "Unit suffix: V",
            ]
        );
        assert_eq!(of_kind(&rx, AnnotationKind::RxSeparator).len(), 2);
    }

    #[test]
    fn measurement_response_values_only() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QM 1 V\r", &mut pos);
        feed(&mut decoder, Direction::Rx, b"0\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"1.23,x\r", &mut pos);

        let details = of_kind(&rx, AnnotationKind::RxDetail);
        let labels: Vec<&str> = details.iter().map(|a| a.label()).collect();
        assert_eq!(
            labels,
            vec!["Measurement value: 1.23", "Unknown response data: x"]
        );
    }
}

// ============================================================================
// Binary Framing Tests
// ============================================================================

mod binary_tests {
    use super::*;
    use helpers::*;

    fn block_with_checksum(payload: &[u8]) -> Vec<u8> {
        let checksum = payload.iter().fold(0u8, |s, &b| s.wrapping_add(b));
        let mut block = format!("{},", payload.len()).into_bytes();
        block.extend_from_slice(payload);
        block.push(checksum);
        block
    }

    #[test]
    fn block_completes_at_exact_byte_count() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QP\r", &mut pos);

        // "0\r5,ABCDE<cs>": 2 ack bytes + 1 digit + comma + 5 payload + checksum
        let mut rx_bytes = b"0\r".to_vec();
        rx_bytes.extend(block_with_checksum(b"ABCDE"));
        assert_eq!(rx_bytes.len(), 10);

        // Nothing is emitted until the final byte arrives.
        let early = feed(&mut decoder, Direction::Rx, &rx_bytes[..9], &mut pos);
        assert!(early.is_empty());

        let done = feed(&mut decoder, Direction::Rx, &rx_bytes[9..], &mut pos);
        assert_eq!(
            label_of(&done, AnnotationKind::Ack).as_deref(),
            Some("Ok (0)")
        );
        assert_eq!(
            label_of(&done, AnnotationKind::RxLength).as_deref(),
            Some("Length: 5")
        );
        assert_eq!(
            label_of(&done, AnnotationKind::RxSeparator).as_deref(),
            Some("Separator: ,")
        );
        assert_eq!(
            label_of(&done, AnnotationKind::RxDetail).as_deref(),
            Some("QUERY PRINT binary response")
        );
        assert_eq!(
            label_of(&done, AnnotationKind::RxChecksumOk).as_deref(),
            Some("Checksum OK")
        );

        // Cycle complete, next command decodes cleanly.
        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
    }

    #[test]
    fn corrupted_payload_yields_checksum_error() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QG 0\r", &mut pos);

        let mut block = block_with_checksum(b"ABCDE");
        // Flip a payload byte after the checksum was computed.
        block[2] ^= 0x01;
        let mut rx_bytes = b"0\r".to_vec();
        rx_bytes.extend(block);

        let done = feed(&mut decoder, Direction::Rx, &rx_bytes, &mut pos);
        assert!(has_kind(&done, AnnotationKind::RxChecksumError));
        assert!(!has_kind(&done, AnnotationKind::RxChecksumOk));

        // A checksum mismatch never blocks the next cycle.
        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
    }

    #[test]
    fn multi_digit_length_block() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QP\r", &mut pos);

        let payload: Vec<u8> = (0u16..12).map(|i| b'a' + (i % 26) as u8).collect();
        let mut rx_bytes = b"0\r".to_vec();
        rx_bytes.extend(block_with_checksum(&payload));

        let done = feed(&mut decoder, Direction::Rx, &rx_bytes, &mut pos);
        assert_eq!(
            label_of(&done, AnnotationKind::RxLength).as_deref(),
            Some("Length: 12")
        );
        assert!(has_kind(&done, AnnotationKind::RxChecksumOk));
    }

    #[test]
    fn error_ack_before_binary_block() {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0;

        feed(&mut decoder, Direction::Tx, b"QP\r", &mut pos);
        let rx = feed(&mut decoder, Direction::Rx, b"2\r", &mut pos);

        assert_eq!(
            label_of(&rx, AnnotationKind::Ack).as_deref(),
            Some("Execution Error (2)")
        );
        assert!(!has_kind(&rx, AnnotationKind::RxLength));

        let next = feed(&mut decoder, Direction::Tx, b"ID\r", &mut pos);
        assert!(!has_kind(&next, AnnotationKind::TxError));
    }
}

// ============================================================================
// Stream Robustness
// ============================================================================

proptest! {
    #[test]
    fn arbitrary_streams_never_panic(stream in prop::collection::vec((any::<bool>(), any::<u8>()), 0..256)) {
        let mut decoder = Decoder::new(Variant::Series90);
        let mut pos = 0u64;
        for (is_tx, value) in stream {
            let direction = if is_tx { Direction::Tx } else { Direction::Rx };
            let event = ByteEvent {
                start: pos,
                end: pos + 10,
                direction,
                value,
            };
            pos += 10;
            for ann in decoder.process(event) {
                prop_assert!(ann.start <= ann.end);
                prop_assert!(!ann.labels.is_empty());
            }
        }
    }
}
