use std::fmt;

/// Report field carrying a single-byte code, used to say which code was not understood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    ReportKind,
    Subtype,
    AlarmClass,
    FallSeverity,
    Presence,
    Motion,
    Proximity,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::ReportKind => "report kind",
            Field::Subtype => "report subtype",
            Field::AlarmClass => "alarm class",
            Field::FallSeverity => "fall severity",
            Field::Presence => "presence",
            Field::Motion => "motion",
            Field::Proximity => "proximity",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong between the UART and a decoded event.
///
/// None of these are fatal: after a framing error the assembler is back to hunting
/// for the next header, and a decode error only concerns the frame it was raised for.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial-port error: {0}")]
    SerialPort(#[from] serialport::Error),
    #[error("no report received in time")]
    Timeout,
    #[error("declared frame length {declared} exceeds maximum of {max}")]
    FrameTooLong { declared: usize, max: usize },
    #[error("declared frame length {declared} is below minimum of {min}")]
    FrameTooShort { declared: usize, min: usize },
    #[error("checksum mismatch: computed {computed:#06X}, frame carries {received:#06X}")]
    ChecksumMismatch { computed: u16, received: u16 },
    #[error("unrecognized report (kind {kind:#04X}, category {category:#04X}, subtype {subtype:#04X})")]
    UnrecognizedReport { kind: u8, category: u8, subtype: u8 },
    #[error("unknown {field} code {code:#04X}")]
    UnknownCode { field: Field, code: u8 },
    #[error("frame too short: need {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },
}

impl Error {
    /// True for errors raised by the link itself rather than by bad bytes on it.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::SerialPort(_) | Error::Timeout)
    }
}
