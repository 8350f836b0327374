//! Report decoders.
//!
//! Every decoder looks at one complete frame and answers `Ok(None)` when the frame is
//! not the kind of report it handles. Once a decoder has claimed a frame, an unknown
//! code in one of its fields is an error rather than a silent miss.

use crate::error::{Error, Field};
use crate::frame::Frame;

const OFFSET_KIND: usize = 3;
const OFFSET_CATEGORY: usize = 4;
const OFFSET_SUBTYPE: usize = 5;
const OFFSET_BODY_SIGN: usize = 6;
const OFFSET_PRESENCE: usize = 6;
const OFFSET_MOTION: usize = 7;
const OFFSET_PROXIMITY: usize = 8;
const OFFSET_ALARM_CLASS: usize = 5;
const OFFSET_SEVERITY: usize = 6;

/// Category byte of a fall report when an alarm is raised.
const ALARM: u8 = 0x01;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $field:expr, { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code),+
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(code: u8) -> Result<Self, Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(Error::UnknownCode { field: $field, code }),
                }
            }
        }
    };
}

wire_enum!(
    /// Byte 3: what sort of report this is.
    ReportKind, Field::ReportKind, {
        Radar = 0x03,
        Active = 0x04,
        Other = 0x05,
        Fall = 0x06,
    }
);

wire_enum!(
    /// Byte 5 of an active report.
    Subtype, Field::Subtype, {
        Heartbeat = 0x01,
        Abnormal = 0x02,
        Environment = 0x05,
        BodySign = 0x06,
        CloseAway = 0x07,
    }
);

wire_enum!(
    /// Byte 5 of a fall report with the alarm flag set.
    AlarmClass, Field::AlarmClass, {
        Fall = 0x01,
        ResidualMovement = 0x02,
    }
);

wire_enum!(
    FallSeverity, Field::FallSeverity, {
        Suspected = 0x00,
        Real = 0x01,
        NoFall = 0x02,
    }
);

wire_enum!(
    /// Direction byte of a close-away report.
    Proximity, Field::Proximity, {
        NoChange = 0x01,
        Approaching = 0x02,
        Leaving = 0x03,
    }
);

/// Presence class derived from a body-sign magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Presence {
    NoOne,
    SomebodyStopped,
    SomebodyMoving,
}

/// Outcome of decoding one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DecodedEvent {
    NoOne,
    SomebodyMoving,
    SomebodyStopped,
    BodyMovement { magnitude: f32, classification: Presence },
    Fall(FallSeverity),
    ProximityChange(Proximity),
    AbnormalReset,
    /// Recognized report that carries nothing to act on.
    NoEvent,
}

/// Body-sign thresholds. Caller policy, not part of the protocol.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySignThresholds {
    /// Below this nobody is there.
    pub move_min: f32,
    /// At or above this somebody is moving.
    pub move_max: f32,
}

impl Default for BodySignThresholds {
    fn default() -> Self {
        Self { move_min: 1.0, move_max: 15.0 }
    }
}

impl BodySignThresholds {
    pub fn classify(&self, magnitude: f32) -> Presence {
        if magnitude < self.move_min {
            Presence::NoOne
        } else if magnitude < self.move_max {
            Presence::SomebodyStopped
        } else {
            Presence::SomebodyMoving
        }
    }
}

fn kind(frame: &Frame) -> Result<Option<ReportKind>, Error> {
    Ok(ReportKind::try_from(frame.byte(OFFSET_KIND)?).ok())
}

fn active_subtype(frame: &Frame) -> Result<Option<Subtype>, Error> {
    if kind(frame)? != Some(ReportKind::Active) {
        return Ok(None);
    }
    Ok(Subtype::try_from(frame.byte(OFFSET_SUBTYPE)?).ok())
}

/// Active body-sign report: thresholds the little-endian `f32` at byte 6.
pub fn decode_body_sign(frame: &Frame, thresholds: &BodySignThresholds) -> Result<Option<DecodedEvent>, Error> {
    if active_subtype(frame)? != Some(Subtype::BodySign) {
        return Ok(None);
    }
    let magnitude = frame.f32_le(OFFSET_BODY_SIGN)?;
    Ok(Some(DecodedEvent::BodyMovement { magnitude, classification: thresholds.classify(magnitude) }))
}

/// Fall report with the alarm flag set.
pub fn decode_fall(frame: &Frame) -> Result<Option<DecodedEvent>, Error> {
    if kind(frame)? != Some(ReportKind::Fall) || frame.byte(OFFSET_CATEGORY)? != ALARM {
        return Ok(None);
    }
    match AlarmClass::try_from(frame.byte(OFFSET_ALARM_CLASS)?)? {
        AlarmClass::Fall => {
            let severity = FallSeverity::try_from(frame.byte(OFFSET_SEVERITY)?)?;
            Ok(Some(DecodedEvent::Fall(severity)))
        }
        AlarmClass::ResidualMovement => Ok(Some(DecodedEvent::NoEvent)),
    }
}

/// Active presence, proximity and abnormal-reset reports.
pub fn decode_situation(frame: &Frame) -> Result<Option<DecodedEvent>, Error> {
    let event = match active_subtype(frame)? {
        Some(Subtype::Environment | Subtype::Heartbeat) => match frame.byte(OFFSET_PRESENCE)? {
            0x00 => DecodedEvent::NoOne,
            0x01 => match frame.byte(OFFSET_MOTION)? {
                0x00 => DecodedEvent::SomebodyStopped,
                0x01 => DecodedEvent::SomebodyMoving,
                code => return Err(Error::UnknownCode { field: Field::Motion, code }),
            },
            code => return Err(Error::UnknownCode { field: Field::Presence, code }),
        },
        Some(Subtype::CloseAway) => {
            DecodedEvent::ProximityChange(Proximity::try_from(frame.byte(OFFSET_PROXIMITY)?)?)
        }
        Some(Subtype::Abnormal) => DecodedEvent::AbnormalReset,
        Some(Subtype::BodySign) | None => return Ok(None),
    };
    Ok(Some(event))
}

/// Run every decoder and return the first one that claims the frame.
pub fn decode(frame: &Frame, thresholds: &BodySignThresholds) -> Result<DecodedEvent, Error> {
    if let Some(event) = decode_body_sign(frame, thresholds)? {
        return Ok(event);
    }
    if let Some(event) = decode_fall(frame)? {
        return Ok(event);
    }
    if let Some(event) = decode_situation(frame)? {
        return Ok(event);
    }
    Err(Error::UnrecognizedReport {
        kind: frame.byte(OFFSET_KIND)?,
        category: frame.byte(OFFSET_CATEGORY)?,
        subtype: frame.byte(OFFSET_SUBTYPE)?,
    })
}
