//! Driver for the **Seeed MR24FDB1 mm‑Wave fall‑detection radar** (fall‑detection firmware profile)
//!
//! The sensor pushes reports over a UART on its own (default 9600 baud). This crate turns that
//! byte stream into frames and frames into events:
//!
//! ```ignore
//! use mr24fdb1::{BodySignThresholds, DecodedEvent, MR24FDB1};
//!
//! let mut radar = MR24FDB1::open("/dev/ttyAMA10", 9_600, std::time::Duration::from_millis(100))?;
//! let thresholds = BodySignThresholds::default();   // 1.0 / 15.0
//!
//! loop {
//!     if let Some(report) = radar.poll(&thresholds)? {
//!         println!("{} -> {:?}", report.frame, report.event);
//!     }
//! }
//! ```
//!
//! ---
//! # High‑level contents
//! * **[`crc`]** – CRC‑16/MODBUS over the two published lookup tables.
//! * **[`frame`]** – [`FrameAssembler`], the header‑hunting, length‑bounded state machine, and
//!   the [`ByteSource`] trait it reads from (implemented for `Box<dyn SerialPort>`).
//! * **[`decode`]** – pure decoders for body‑sign, fall and situation reports.
//! * **[`MR24FDB1`]** – owns a port plus one assembler and glues the three together.
//! * **Error handling** – one [`Error`] enum for transport, framing and decoding failures.
//!
//! ## Frame layout
//! | Offset | Field                                            |
//! |--------|--------------------------------------------------|
//! | 0      | header `0x55`                                    |
//! | 1      | length `L`: bytes after the header, CRC included  |
//! | 2      | length high byte, always `0x00`                  |
//! | 3      | report kind (radar / active / other / fall)      |
//! | 4      | category, alarm flag for fall reports            |
//! | 5      | subtype, alarm class for fall reports            |
//! | 6..    | payload                                          |
//! | last 2 | CRC‑16, see [`crc::compute`]                     |

use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, info};

pub mod crc;
pub mod decode;
pub mod error;
pub mod frame;

pub use decode::{
    decode, decode_body_sign, decode_fall, decode_situation, BodySignThresholds, DecodedEvent, FallSeverity,
    Presence, Proximity,
};
pub use error::{Error, Field};
pub use frame::{AssemblerConfig, AssemblerStats, ByteSource, Frame, FrameAssembler};

/// Baud rate the sensor ships with.
pub const DEFAULT_BAUD: u32 = 9_600;

/// A decoded event together with the frame it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub frame: Frame,
    pub event: DecodedEvent,
}

// ------------------------------------------------------------------------------------------------
// Main driver struct
// ------------------------------------------------------------------------------------------------

pub struct MR24FDB1<S = Box<dyn SerialPort>> {
    port: S,
    assembler: FrameAssembler,
}

impl MR24FDB1 {
    /// Open the given serial device at `baud` with the provided read `timeout`.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self, Error> {
        Self::open_with_config(path, baud, timeout, AssemblerConfig::default())
    }

    /// Like [`MR24FDB1::open`], with custom framing limits or checksum checking turned off.
    #[tracing::instrument]
    pub fn open_with_config(path: &str, baud: u32, timeout: Duration, config: AssemblerConfig) -> Result<Self, Error> {
        let port = serialport::new(path, baud).timeout(timeout).open()?;
        info!("opened {path} at {baud} baud");
        Ok(Self::with_assembler(port, FrameAssembler::with_config(config)))
    }
}

impl<S: ByteSource> MR24FDB1<S> {
    /// Wrap an already opened byte source with a default assembler (CRC checked).
    pub fn new(port: S) -> Self {
        Self::with_assembler(port, FrameAssembler::new())
    }

    pub fn with_assembler(port: S, assembler: FrameAssembler) -> Self {
        Self { port, assembler }
    }

    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    /// Pull whatever the port has buffered into the assembler. Never blocks.
    pub fn read_frame(&mut self) -> Result<(), Error> {
        self.assembler.feed(&mut self.port)
    }

    /// The completed frame, if any. Each frame is returned once.
    pub fn get_message(&mut self) -> Option<Frame> {
        self.assembler.take_frame()
    }

    /// One non-blocking round: read, take a frame if one completed, decode it.
    #[tracing::instrument(skip(self), level = "trace")]
    pub fn poll(&mut self, thresholds: &BodySignThresholds) -> Result<Option<Report>, Error> {
        self.read_frame()?;
        let Some(frame) = self.get_message() else {
            return Ok(None);
        };
        debug!("frame {frame}");
        let event = decode(&frame, thresholds)?;
        Ok(Some(Report { frame, event }))
    }

    /// Poll until a report decodes or `timeout` runs out, sleeping `interval` between rounds.
    ///
    /// Framing and decoding errors are returned as they happen; the next call picks up where
    /// this one stopped.
    pub fn next_report(
        &mut self,
        thresholds: &BodySignThresholds,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Report, Error> {
        let start = Instant::now();
        loop {
            if let Some(report) = self.poll(thresholds)? {
                return Ok(report);
            }
            if start.elapsed() > timeout {
                return Err(Error::Timeout);
            }
            std::thread::sleep(interval);
        }
    }
}
