//! Command registry
//!
//! Static descriptor table for the ScopeMeter command set. Every command
//! is identified by a two-letter ASCII code; lookup never fails, codes
//! absent from the table resolve to the [`UNKNOWN`] sentinel so a cycle
//! always completes predictably.

use crate::Variant;

/// One phase of a command/response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Host transmits a command frame
    Transmit,
    /// Instrument acknowledges
    Acknowledge,
    /// Instrument returns response data
    Return,
}

impl Phase {
    /// Single-letter symbol used in flow patterns
    pub fn symbol(&self) -> char {
        match self {
            Phase::Transmit => 'T',
            Phase::Acknowledge => 'A',
            Phase::Return => 'R',
        }
    }
}

/// Expected phase sequence for a command's exchange
pub type Flow = &'static [Phase];

/// Fire-and-forget: command, acknowledge
pub const FLOW_TA: Flow = &[Phase::Transmit, Phase::Acknowledge];
/// Query: command, acknowledge, response data
pub const FLOW_TAR: Flow = &[Phase::Transmit, Phase::Acknowledge, Phase::Return];
/// Two-stage program: command, acknowledge, data frame, acknowledge
pub const FLOW_TATA: Flow = &[
    Phase::Transmit,
    Phase::Acknowledge,
    Phase::Transmit,
    Phase::Acknowledge,
];

/// Framing of a command's response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferKind {
    /// CR-terminated text
    Ascii,
    /// `<length>,<payload><checksum>` block
    Binary,
}

/// How a query command's response payload is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHandler {
    /// Annotate the payload as one text span
    PlainText,
    /// Decode a 1-2 byte status/error register bitfield
    Registers,
    /// Split comma-separated measurement fields
    Measurement,
    /// Length-prefixed binary block with checksum
    Binary,
}

/// Closed set of known commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandId {
    /// A lone terminator with no command in front of it
    None,
    /// Code not present in the registry
    Unknown,
    /// AS
    AutoSetup,
    /// AT
    ArmTrigger,
    /// CV
    CplVersionQuery,
    /// DS
    DefaultSetup,
    /// GL
    GoToLocal,
    /// GR
    GoToRemote,
    /// ID
    Identification,
    /// IS
    InstrumentStatus,
    /// LL
    LocalLockout,
    /// PC
    ProgramCommunication,
    /// PS
    ProgramSetup,
    /// PW
    ProgramWaveform,
    /// QG (undocumented, used by FlukeView for screenshots)
    QueryGraphics,
    /// QM
    QueryMeasurement,
    /// QP
    QueryPrint,
    /// QS
    QuerySetup,
    /// QW
    QueryWaveform,
    /// RD
    ReadDate,
    /// RI
    ResetInstrument,
    /// RS
    RecallSetup,
    /// RT
    ReadTime,
    /// SS
    SaveSetup,
    /// ST
    StatusQuery,
    /// TA
    TriggerAcquisition,
    /// VS
    ViewScreen,
    /// WD
    WriteDate,
    /// WT
    WriteTime,
}

/// Enumerable values a parameter may take, used for labeling only
///
/// Several parameters address numbered instrument registers whose
/// descriptions follow fixed numeric ranges; those are expressed as range
/// matches rather than literal tables. Unknown literals are never
/// rejected, they just get no description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSet {
    /// No enumerable values
    None,
    /// Literal-to-description table
    Literals(&'static [(&'static str, &'static str)]),
    /// SS setup registers: stored setups and waveform setups
    SaveRegister,
    /// RS setup registers: SS set plus screen setups and live traces
    RecallRegister,
    /// PW trace numbers
    ProgramTrace,
    /// QW trace numbers: PW set plus ScopeRecord and trend traces
    QueryTrace,
    /// VS screen numbers
    Screen,
    /// QM field numbers (scope mode)
    MeasureField,
}

impl ValueSet {
    /// Describe a parameter literal, if it is a known value
    pub fn describe(&self, literal: &str) -> Option<String> {
        match self {
            ValueSet::None => None,
            ValueSet::Literals(table) => table
                .iter()
                .find(|(lit, _)| literal.eq_ignore_ascii_case(lit))
                .map(|(_, desc)| (*desc).to_string()),
            ValueSet::SaveRegister => describe_setup_register(literal.parse().ok()?, false),
            ValueSet::RecallRegister => describe_setup_register(literal.parse().ok()?, true),
            ValueSet::ProgramTrace => describe_trace(literal.parse().ok()?, false),
            ValueSet::QueryTrace => describe_trace(literal.parse().ok()?, true),
            ValueSet::Screen => match literal.parse().ok()? {
                0u32 => Some("Exit View Screen mode".to_string()),
                n @ 1..=10 => Some(format!("View screen {n}")),
                _ => None,
            },
            ValueSet::MeasureField => describe_measure_field(literal.parse().ok()?),
        }
    }
}

fn describe_setup_register(n: u32, recall: bool) -> Option<String> {
    match n {
        1..=40 => Some(format!("Stored setup {n}")),
        61..=70 if recall => Some(format!("Stored screen setup {}", n - 60)),
        92..=99 if recall => Some("Live trace setup".to_string()),
        101..=103 => Some("Live trace setup".to_string()),
        104..=123 => Some(format!("Stored waveform setup {}", n - 103)),
        _ => None,
    }
}

fn describe_trace(n: u32, query: bool) -> Option<String> {
    let named = match n {
        88 if query => Some("ScopeRecord INPUT A"),
        89 if query => Some("ScopeRecord INPUT B"),
        92 if query => Some("Max A"),
        93 if query => Some("Min A"),
        94 if query => Some("Max B"),
        95 if query => Some("Min B"),
        96 if query => Some("Max Trend"),
        97 if query => Some("Avg Trend"),
        98 if query => Some("Min Trend"),
        101 => Some("INPUT A"),
        102 => Some("INPUT B"),
        103 => Some("A +/- B"),
        _ => None,
    };
    match named {
        Some(s) => Some(s.to_string()),
        None => match n {
            104..=123 => Some(format!("Stored waveform {}", n - 103)),
            _ => None,
        },
    }
}

fn describe_measure_field(n: u32) -> Option<String> {
    let (mtype, desc) = match n {
        1 => ("dV", "Voltage between cursors"),
        2 => ("dt", "Time between cursors"),
        3 => ("1/dt", "Reciprocal of time between cursors"),
        4 => ("t1 from TRIG", "Trigger to cursor left"),
        5 => ("RMS", "RMS value"),
        6 => ("MEAN", "MEAN value"),
        7 => ("P-P", "Peak to Peak voltage"),
        8 => ("MAX-P", "Maximum peak voltage"),
        9 => ("MIN-P", "Minimum peak voltage"),
        10 => ("FREQ", "Signal frequency"),
        11 => ("RISE", "Rise time (10% to 90%)"),
        12 => ("PHASE src>des1", "Phase src to destination"),
        13 => ("PHASE src>des2", "Phase src to destination"),
        14 => ("PHASE src>des3", "Phase src to destination"),
        15 => ("V1", "Voltage at cursor left"),
        16 => ("V2", "Voltage at cursor right"),
        17 => ("t2 from TRIG", "Trigger to cursor right"),
        18 => ("t1 from START", "Time from start to cursor left"),
        19 => ("t2 from START", "Time from start to cursor right"),
        20 => ("t1 time of day", "Real time stamp at cursor left"),
        21 => ("t2 time of day", "Real time stamp at cursor right"),
        _ => return None,
    };
    Some(format!("{mtype}: {desc}"))
}

/// Declared parameter of a command, used for positional labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Parameter name shown in annotations
    pub name: &'static str,
    /// Whether the instrument requires this parameter
    pub required: bool,
    /// Enumerable values, for labeling only
    pub values: ValueSet,
}

/// Static descriptor of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command identity
    pub id: CommandId,
    /// Two-letter code as sent on the wire (empty for the sentinels)
    pub code: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Expected exchange phases
    pub flow: Flow,
    /// Declared parameters, in order
    pub parameters: &'static [ParameterSpec],
    /// Framing of the response, if the flow has a Return phase
    pub transfer: TransferKind,
    /// Response payload decoder, if the flow has a Return phase
    pub handler: Option<ResponseHandler>,
}

/// Sentinel for a bare terminator sent without a command
pub const NONE: CommandDescriptor = CommandDescriptor {
    id: CommandId::None,
    code: "",
    name: "Command terminator",
    flow: FLOW_TA,
    parameters: &[],
    transfer: TransferKind::Ascii,
    handler: None,
};

/// Sentinel for codes absent from the registry
pub const UNKNOWN: CommandDescriptor = CommandDescriptor {
    id: CommandId::Unknown,
    code: "",
    name: "Unknown command",
    flow: FLOW_TA,
    parameters: &[],
    transfer: TransferKind::Ascii,
    handler: None,
};

const NO_PARAMS: &[ParameterSpec] = &[];

const PC_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "Baud rate",
        required: true,
        values: ValueSet::None,
    },
    ParameterSpec {
        name: "Parity",
        required: true,
        values: ValueSet::Literals(&[("O", "Odd"), ("E", "Even"), ("N", "None")]),
    },
    ParameterSpec {
        name: "Data bits",
        required: true,
        values: ValueSet::None,
    },
    ParameterSpec {
        name: "Stop bits",
        required: true,
        values: ValueSet::None,
    },
    ParameterSpec {
        name: "Handshake",
        required: false,
        values: ValueSet::Literals(&[("XONXOFF", "XON/XOFF software handshake")]),
    },
];

const PS_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "1",
        required: true,
        values: ValueSet::None,
    },
    ParameterSpec {
        name: "Setup",
        required: true,
        values: ValueSet::None,
    },
];

const PW_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "Trace no",
        required: true,
        values: ValueSet::ProgramTrace,
    },
    ParameterSpec {
        name: "Setup",
        required: false,
        values: ValueSet::Literals(&[("S", "Include setup")]),
    },
];

const QG_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "UNDOCUMENTED",
    required: true,
    values: ValueSet::None,
}];

const QM_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "Field no",
        required: true,
        values: ValueSet::MeasureField,
    },
    ParameterSpec {
        name: "Values only",
        required: false,
        values: ValueSet::Literals(&[("V", "Values only")]),
    },
];

const QW_PARAMS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "Trace no",
        required: true,
        values: ValueSet::QueryTrace,
    },
    ParameterSpec {
        name: "Format option",
        required: false,
        values: ValueSet::Literals(&[("V", "Values only"), ("S", "Include setup")]),
    },
];

const RS_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "Setup register",
    required: true,
    values: ValueSet::RecallRegister,
}];

const SS_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "Setup register",
    required: true,
    values: ValueSet::SaveRegister,
}];

const VS_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "View screen",
    required: true,
    values: ValueSet::Screen,
}];

const WD_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "Date",
    required: true,
    values: ValueSet::None,
}];

const WT_PARAMS: &[ParameterSpec] = &[ParameterSpec {
    name: "Time",
    required: true,
    values: ValueSet::None,
}];

macro_rules! cmd {
    ($id:ident, $code:literal, $name:literal, $flow:expr, $params:expr) => {
        CommandDescriptor {
            id: CommandId::$id,
            code: $code,
            name: $name,
            flow: $flow,
            parameters: $params,
            transfer: TransferKind::Ascii,
            handler: None,
        }
    };
    ($id:ident, $code:literal, $name:literal, $flow:expr, $params:expr, $transfer:ident, $handler:ident) => {
        CommandDescriptor {
            id: CommandId::$id,
            code: $code,
            name: $name,
            flow: $flow,
            parameters: $params,
            transfer: TransferKind::$transfer,
            handler: Some(ResponseHandler::$handler),
        }
    };
}

/// Command table for the 90 series
const SERIES90: &[CommandDescriptor] = &[
    cmd!(AutoSetup, "AS", "AUTO SETUP", FLOW_TA, NO_PARAMS),
    cmd!(ArmTrigger, "AT", "ARM TRIGGER", FLOW_TA, NO_PARAMS),
    cmd!(
        CplVersionQuery,
        "CV",
        "CPL VERSION QUERY",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(DefaultSetup, "DS", "DEFAULT SETUP", FLOW_TA, NO_PARAMS),
    cmd!(GoToLocal, "GL", "GO TO LOCAL", FLOW_TA, NO_PARAMS),
    cmd!(GoToRemote, "GR", "GO TO REMOTE", FLOW_TA, NO_PARAMS),
    cmd!(
        Identification,
        "ID",
        "IDENTIFICATION",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(
        InstrumentStatus,
        "IS",
        "INSTRUMENT STATUS",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        Registers
    ),
    cmd!(LocalLockout, "LL", "LOCAL LOCKOUT", FLOW_TA, NO_PARAMS),
    cmd!(
        ProgramCommunication,
        "PC",
        "PROGRAM COMMUNICATION",
        FLOW_TA,
        PC_PARAMS
    ),
    cmd!(ProgramSetup, "PS", "PROGRAM SETUP", FLOW_TA, PS_PARAMS),
    cmd!(ProgramWaveform, "PW", "PROGRAM WAVEFORM", FLOW_TATA, PW_PARAMS),
    cmd!(
        QueryGraphics,
        "QG",
        "QG - UNDOCUMENTED",
        FLOW_TAR,
        QG_PARAMS,
        Binary,
        Binary
    ),
    cmd!(
        QueryMeasurement,
        "QM",
        "QUERY MEASUREMENT",
        FLOW_TAR,
        QM_PARAMS,
        Ascii,
        Measurement
    ),
    cmd!(
        QueryPrint,
        "QP",
        "QUERY PRINT",
        FLOW_TAR,
        NO_PARAMS,
        Binary,
        Binary
    ),
    cmd!(
        QuerySetup,
        "QS",
        "QUERY SETUP",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(
        QueryWaveform,
        "QW",
        "QUERY WAVEFORM",
        FLOW_TAR,
        QW_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(
        ReadDate,
        "RD",
        "READ DATE",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(ResetInstrument, "RI", "RESET INSTRUMENT", FLOW_TA, NO_PARAMS),
    cmd!(RecallSetup, "RS", "RECALL SETUP", FLOW_TA, RS_PARAMS),
    cmd!(
        ReadTime,
        "RT",
        "READ TIME",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        PlainText
    ),
    cmd!(SaveSetup, "SS", "SAVE SETUP", FLOW_TA, SS_PARAMS),
    cmd!(
        StatusQuery,
        "ST",
        "STATUS QUERY",
        FLOW_TAR,
        NO_PARAMS,
        Ascii,
        Registers
    ),
    cmd!(TriggerAcquisition, "TA", "TRIGGER ACQUISITION", FLOW_TA, NO_PARAMS),
    cmd!(ViewScreen, "VS", "VIEW SCREEN", FLOW_TA, VS_PARAMS),
    cmd!(WriteDate, "WD", "WRITE DATE", FLOW_TA, WD_PARAMS),
    cmd!(WriteTime, "WT", "WRITE TIME", FLOW_TA, WT_PARAMS),
];

/// Look up a command code in the active variant's table
///
/// Matching is case-insensitive. Codes not in the table resolve to
/// [`UNKNOWN`], so lookup always succeeds.
pub fn lookup(variant: Variant, code: &str) -> &'static CommandDescriptor {
    let table = match variant {
        Variant::Series90 => SERIES90,
    };
    table
        .iter()
        .find(|desc| desc.code.eq_ignore_ascii_case(code))
        .unwrap_or(&UNKNOWN)
}
