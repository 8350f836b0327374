//! Consumers of decoded reports. Decoding stays pure; anything that prints, stores or
//! alerts sits behind [`EventSink`].

use mr24fdb1::{DecodedEvent, Error, FallSeverity, Presence, Proximity, Report};
use tracing::{debug, info, warn};

pub trait EventSink {
    /// Called once per decoded report.
    fn on_report(&mut self, report: &Report);

    /// Called for framing and decoding errors. The monitor keeps going after these.
    fn on_error(&mut self, _error: &Error) {}
}

/// Human readable summary of an event.
pub fn describe(event: &DecodedEvent) -> String {
    match event {
        DecodedEvent::NoOne => "radar detects no one".to_string(),
        DecodedEvent::SomebodyMoving => "radar detects somebody moving".to_string(),
        DecodedEvent::SomebodyStopped => "radar detects somebody stopping".to_string(),
        DecodedEvent::BodyMovement { magnitude, classification } => {
            let class = match classification {
                Presence::NoOne => "nobody",
                Presence::SomebodyStopped => "somebody stopped",
                Presence::SomebodyMoving => "somebody moving",
            };
            format!("body sign {magnitude:.2} ({class})")
        }
        DecodedEvent::Fall(FallSeverity::Suspected) => "suspected fall".to_string(),
        DecodedEvent::Fall(FallSeverity::Real) => "fall detected".to_string(),
        DecodedEvent::Fall(FallSeverity::NoFall) => "fall alarm cleared".to_string(),
        DecodedEvent::ProximityChange(Proximity::Approaching) => "radar detects somebody approaching".to_string(),
        DecodedEvent::ProximityChange(Proximity::Leaving) => "radar detects somebody leaving".to_string(),
        DecodedEvent::ProximityChange(Proximity::NoChange) => "radar detects no movement".to_string(),
        DecodedEvent::AbnormalReset => "radar abnormal reset".to_string(),
        DecodedEvent::NoEvent => "no event".to_string(),
    }
}

/// Logs every report through `tracing`. Falls and resets are raised to `warn`.
#[derive(Debug, Default)]
pub struct TracingSink {
    last: Option<DecodedEvent>,
}

impl EventSink for TracingSink {
    fn on_report(&mut self, report: &Report) {
        debug!("frame {}", report.frame);
        let text = describe(&report.event);
        match report.event {
            DecodedEvent::Fall(FallSeverity::Real | FallSeverity::Suspected) | DecodedEvent::AbnormalReset => {
                warn!("{text}")
            }
            // presence reports repeat every few seconds, only log changes loudly
            _ if self.last == Some(report.event) => debug!("{text}"),
            _ => info!("{text}"),
        }
        self.last = Some(report.event);
    }

    fn on_error(&mut self, error: &Error) {
        warn!("radar report dropped: {error}");
    }
}
