use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::MonitorConfig;
use mr24fdb1::{BodySignThresholds, ByteSource, DecodedEvent, MR24FDB1};
use sink::{EventSink, TracingSink};

pub mod config;
pub mod sink;

/// A radar link plus the policy and sink its reports go to.
pub struct RadarMonitor<S, K> {
    radar: MR24FDB1<S>,
    thresholds: BodySignThresholds,
    sink: K,
}

impl<S: ByteSource, K: EventSink> RadarMonitor<S, K> {
    pub fn new(radar: MR24FDB1<S>, thresholds: BodySignThresholds, sink: K) -> Self {
        Self { radar, thresholds, sink }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn radar(&self) -> &MR24FDB1<S> {
        &self.radar
    }

    /// Decode every frame the port has buffered right now and hand the results to the sink.
    ///
    /// Bad frames and unknown reports go to [`EventSink::on_error`]; only transport
    /// failures are returned.
    pub fn drain(&mut self) -> Result<Vec<DecodedEvent>, mr24fdb1::Error> {
        let mut events = Vec::new();
        loop {
            match self.radar.poll(&self.thresholds) {
                Ok(Some(report)) => {
                    self.sink.on_report(&report);
                    events.push(report.event);
                }
                Ok(None) => break,
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => self.sink.on_error(&e),
            }
        }
        Ok(events)
    }
}

pub async fn radar_monitor(config: MonitorConfig) -> Result<(), Box<dyn Error>> {
    let cancel = CancellationToken::new();
    let cloned_cancel = cancel.clone();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received.");
        cancel.cancel();
    });

    let radar = MR24FDB1::open_with_config(&config.port, config.baud, config.timeout, config.assembler_config())?;
    let mut monitor = RadarMonitor::new(radar, config.thresholds, TracingSink::default());
    info!("Radar monitor initialized on {}.", config.port);

    tokio::select! {
        result = poll_radar(&mut monitor, config.poll_interval) => {
            result?;
        },
        _ = cloned_cancel.cancelled() => {
            info!("Received shutdown signal.");
        }
    }

    let stats = monitor.radar().assembler().stats();
    info!(
        "Monitor stopped after {} frames ({} rejected, {} stray bytes).",
        stats.frames, stats.rejected, stats.discarded_bytes
    );
    Ok(())
}

/// Drain the radar every `period` until the link fails.
pub async fn poll_radar<S: ByteSource, K: EventSink>(
    monitor: &mut RadarMonitor<S, K>,
    period: Duration,
) -> Result<(), mr24fdb1::Error> {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        monitor.drain()?;
    }
}
