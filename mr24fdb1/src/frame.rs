//! Frame assembly from a lossy UART byte stream.
//!
//! A frame on the wire is `[0x55, L, ..., CRC, CRC]` where `L` counts every byte after
//! the header, itself and the two checksum bytes included. The assembler hunts for the
//! header, then trusts `L` alone to find the end of the frame: a `0x55` inside a payload
//! is just data. If a byte is lost mid-frame the assembler swallows bytes of the next
//! frame to make up the count, and the checksum check is what catches it.

use std::collections::VecDeque;
use std::fmt;
use std::io::Read;

use serialport::SerialPort;
use tracing::{debug, trace, warn};

use crate::crc;
use crate::error::Error;

/// Sentinel byte starting every frame.
pub const HEADER: u8 = 0x55;
/// Smallest usable length byte: the length byte itself plus the CRC trailer.
pub const MIN_DECLARED_LEN: usize = 3;
/// Default upper bound for the length byte. Reports from this firmware are far shorter.
pub const DEFAULT_MAX_DECLARED_LEN: usize = 64;

/// One complete frame, header and CRC trailer included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Wrap bytes that already form a whole frame. No validation is done here.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Value of the length byte, or 0 for a frame too short to have one.
    pub fn declared_len(&self) -> usize {
        self.bytes.get(1).copied().unwrap_or(0) as usize
    }

    /// Byte at `offset`, or `Truncated` if the frame does not reach it.
    pub fn byte(&self, offset: usize) -> Result<u8, Error> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(Error::Truncated { needed: offset + 1, len: self.bytes.len() })
    }

    /// Little-endian `f32` starting at `offset`.
    pub fn f32_le(&self, offset: usize) -> Result<f32, Error> {
        let raw = self
            .bytes
            .get(offset..offset + 4)
            .ok_or(Error::Truncated { needed: offset + 4, len: self.bytes.len() })?;
        Ok(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Checksum trailer as carried by the frame (first wire byte in the high half).
    pub fn crc_trailer(&self) -> Option<u16> {
        let n = self.bytes.len();
        (n >= 2).then(|| u16::from_be_bytes([self.bytes[n - 2], self.bytes[n - 1]]))
    }

    pub fn verify_checksum(&self) -> Result<(), Error> {
        crc::verify(&self.bytes)
    }
}

/// Space separated upper-case hex, the way the sensor's datasheet prints frames.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Where the assembler pulls bytes from. Both calls must return without blocking when
/// `bytes_available` reported data.
pub trait ByteSource {
    /// How many bytes can be read right now.
    fn bytes_available(&mut self) -> Result<usize, Error>;
    /// Read one byte. Only called after `bytes_available` returned non-zero.
    fn read_byte(&mut self) -> Result<u8, Error>;
}

impl ByteSource for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> Result<usize, Error> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl ByteSource for VecDeque<u8> {
    fn bytes_available(&mut self) -> Result<usize, Error> {
        Ok(self.len())
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        self.pop_front()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into())
    }
}

/// Tunables for [`FrameAssembler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Largest accepted length byte; anything above fails with `FrameTooLong`.
    pub max_declared_len: usize,
    /// Drop frames whose CRC trailer does not match. Turning this off trusts any
    /// frame whose length adds up.
    pub verify_checksum: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { max_declared_len: DEFAULT_MAX_DECLARED_LEN, verify_checksum: true }
    }
}

/// Running counters, mostly useful to tell a noisy link from a quiet one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames: u64,
    pub rejected: u64,
    pub discarded_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    /// Hunting for the header byte.
    Idle,
    /// Header seen; `declared` is known once the length byte arrived.
    Receiving { buf: Vec<u8>, declared: Option<usize> },
    /// Waiting for `take_frame`.
    Complete(Frame),
}

/// Byte-at-a-time frame assembler. One instance per sensor link, owned by the caller.
#[derive(Clone, Debug)]
pub struct FrameAssembler {
    state: State,
    config: AssemblerConfig,
    stats: AssemblerStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_config(AssemblerConfig::default())
    }

    pub fn with_config(config: AssemblerConfig) -> Self {
        Self { state: State::Idle, config, stats: AssemblerStats::default() }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// A completed frame is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Complete(_))
    }

    /// Header seen, frame not finished yet.
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, State::Receiving { .. })
    }

    /// Drop any partial or pending frame and go back to hunting for a header.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Drain what `source` has available right now, one byte at a time.
    ///
    /// Stops as soon as a frame completes so that a pending frame is never overwritten;
    /// the rest stays in the source until the frame was taken. A framing error leaves the
    /// assembler hunting again and the remaining bytes unread.
    pub fn feed<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<(), Error> {
        while !self.is_ready() && source.bytes_available()? > 0 {
            let byte = source.read_byte()?;
            self.push(byte)?;
        }
        Ok(())
    }

    /// Advance the state machine by one byte.
    ///
    /// A byte pushed while a completed frame is still pending is dropped.
    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        match &mut self.state {
            State::Idle => {
                if byte == HEADER {
                    self.state = State::Receiving { buf: vec![HEADER], declared: None };
                } else {
                    self.stats.discarded_bytes += 1;
                    trace!("discarding {byte:#04X} while hunting for header");
                }
                Ok(())
            }
            State::Complete(_) => {
                self.stats.discarded_bytes += 1;
                trace!("frame pending, dropping {byte:#04X}");
                Ok(())
            }
            State::Receiving { buf, declared } => {
                buf.push(byte);
                let declared_len = match *declared {
                    Some(len) => len,
                    None => {
                        let len = byte as usize;
                        if len > self.config.max_declared_len {
                            return self.reject(Error::FrameTooLong {
                                declared: len,
                                max: self.config.max_declared_len,
                            });
                        }
                        if len < MIN_DECLARED_LEN {
                            return self.reject(Error::FrameTooShort { declared: len, min: MIN_DECLARED_LEN });
                        }
                        *declared = Some(len);
                        len
                    }
                };
                if buf.len() < declared_len + 1 {
                    return Ok(());
                }
                let frame = Frame::from_bytes(std::mem::take(buf));
                if self.config.verify_checksum {
                    if let Err(e) = frame.verify_checksum() {
                        debug!("rejecting frame {frame}");
                        return self.reject(e);
                    }
                }
                self.stats.frames += 1;
                self.state = State::Complete(frame);
                Ok(())
            }
        }
    }

    /// Hand out the completed frame, at most once.
    pub fn take_frame(&mut self) -> Option<Frame> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Complete(frame) => Some(frame),
            other => {
                self.state = other;
                None
            }
        }
    }

    fn reject(&mut self, err: Error) -> Result<(), Error> {
        warn!("frame rejected: {err}");
        self.stats.rejected += 1;
        self.state = State::Idle;
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALL_REAL: [u8; 9] = [0x55, 0x08, 0x00, 0x06, 0x01, 0x01, 0x01, 0x8E, 0x55];
    const ABNORMAL: [u8; 8] = [0x55, 0x07, 0x00, 0x04, 0x03, 0x02, 0x79, 0x2E];

    fn source(bytes: &[u8]) -> VecDeque<u8> {
        bytes.iter().copied().collect()
    }

    #[test]
    fn noise_without_header_never_yields_a_frame() {
        let noise: Vec<u8> = (0..=255u8).filter(|&b| b != HEADER).cycle().take(2000).collect();
        let mut src = source(&noise);
        let mut asm = FrameAssembler::new();
        asm.feed(&mut src).unwrap();
        assert!(src.is_empty());
        assert_eq!(asm.take_frame(), None);
        assert_eq!(asm.stats().discarded_bytes, 2000);
    }

    #[test]
    fn skips_leading_noise() {
        let mut bytes = vec![0x00, 0xFF, 0x13];
        bytes.extend_from_slice(&ABNORMAL);
        let mut asm = FrameAssembler::new();
        asm.feed(&mut source(&bytes)).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &ABNORMAL);
    }

    #[test]
    fn frame_split_across_reads() {
        let mut asm = FrameAssembler::new();
        asm.feed(&mut source(&FALL_REAL[..4])).unwrap();
        assert!(asm.is_receiving());
        assert_eq!(asm.take_frame(), None);
        asm.feed(&mut source(&FALL_REAL[4..])).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &FALL_REAL);
    }

    #[test]
    fn incomplete_frame_never_completes() {
        let mut asm = FrameAssembler::new();
        for _ in 0..10 {
            asm.feed(&mut source(&[])).unwrap();
        }
        asm.feed(&mut source(&FALL_REAL[..FALL_REAL.len() - 1])).unwrap();
        assert!(!asm.is_ready());
        assert_eq!(asm.take_frame(), None);
    }

    #[test]
    fn completes_on_last_declared_byte() {
        let mut asm = FrameAssembler::new();
        for (i, &b) in FALL_REAL.iter().enumerate() {
            assert!(!asm.is_ready(), "ready early at byte {i}");
            asm.push(b).unwrap();
        }
        assert!(asm.is_ready());
        assert_eq!(asm.take_frame().unwrap().declared_len(), 8);
    }

    #[test]
    fn take_frame_consumes_once() {
        let mut asm = FrameAssembler::new();
        asm.feed(&mut source(&ABNORMAL)).unwrap();
        assert!(asm.take_frame().is_some());
        assert_eq!(asm.take_frame(), None);
    }

    #[test]
    fn intake_pauses_while_frame_pending() {
        let mut bytes = ABNORMAL.to_vec();
        bytes.extend_from_slice(&FALL_REAL);
        let mut src = source(&bytes);
        let mut asm = FrameAssembler::new();

        asm.feed(&mut src).unwrap();
        assert_eq!(src.len(), FALL_REAL.len());
        asm.feed(&mut src).unwrap();
        assert_eq!(src.len(), FALL_REAL.len());
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &ABNORMAL);

        asm.feed(&mut src).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &FALL_REAL);
    }

    #[test]
    fn header_byte_inside_payload_is_data() {
        // FALL_REAL ends in 0x55; the next frame must still be found
        let mut bytes = FALL_REAL.to_vec();
        bytes.extend_from_slice(&ABNORMAL);
        let mut src = source(&bytes);
        let mut asm = FrameAssembler::new();
        asm.feed(&mut src).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &FALL_REAL);
        asm.feed(&mut src).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &ABNORMAL);
    }

    #[test]
    fn oversized_length_is_rejected_and_resyncs() {
        let mut bytes = vec![0x55, 0xC8, 0x01, 0x02];
        bytes.extend_from_slice(&ABNORMAL);
        let mut src = source(&bytes);
        let mut asm = FrameAssembler::new();

        let err = asm.feed(&mut src).unwrap_err();
        assert!(matches!(err, Error::FrameTooLong { declared: 200, max: DEFAULT_MAX_DECLARED_LEN }));
        assert!(!asm.is_receiving());

        asm.feed(&mut src).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &ABNORMAL);
        assert_eq!(asm.stats().rejected, 1);
    }

    #[test]
    fn configurable_maximum() {
        let mut asm = FrameAssembler::with_config(AssemblerConfig { max_declared_len: 7, ..Default::default() });
        assert!(asm.feed(&mut source(&ABNORMAL)).is_ok());
        assert!(asm.take_frame().is_some());
        assert!(matches!(
            asm.feed(&mut source(&FALL_REAL)),
            Err(Error::FrameTooLong { declared: 8, max: 7 })
        ));
    }

    #[test]
    fn undersized_length_is_rejected() {
        let mut asm = FrameAssembler::new();
        let err = asm.feed(&mut source(&[0x55, 0x01])).unwrap_err();
        assert!(matches!(err, Error::FrameTooShort { declared: 1, min: MIN_DECLARED_LEN }));
        assert!(!asm.is_receiving());
    }

    #[test]
    fn dropped_byte_surfaces_as_checksum_mismatch() {
        let mut damaged = FALL_REAL.to_vec();
        damaged.remove(4);
        damaged.extend_from_slice(&ABNORMAL);
        damaged.extend_from_slice(&ABNORMAL);
        let mut src = source(&damaged);
        let mut asm = FrameAssembler::new();

        assert!(matches!(asm.feed(&mut src), Err(Error::ChecksumMismatch { .. })));
        // the rest of the second frame is noise until the third frame's header
        asm.feed(&mut src).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &ABNORMAL);
    }

    #[test]
    fn checksum_verification_can_be_disabled() {
        let mut corrupted = ABNORMAL;
        corrupted[6] = 0x00;
        let mut asm = FrameAssembler::with_config(AssemblerConfig { verify_checksum: false, ..Default::default() });
        asm.feed(&mut source(&corrupted)).unwrap();
        assert_eq!(asm.take_frame().unwrap().as_bytes(), &corrupted);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut asm = FrameAssembler::new();
        asm.feed(&mut source(&ABNORMAL[..3])).unwrap();
        asm.reset();
        asm.feed(&mut source(&ABNORMAL[3..])).unwrap();
        assert_eq!(asm.take_frame(), None);
    }

    #[test]
    fn independent_assemblers_do_not_share_state() {
        let mut a = FrameAssembler::new();
        let mut b = FrameAssembler::new();
        a.feed(&mut source(&ABNORMAL[..4])).unwrap();
        b.feed(&mut source(&FALL_REAL)).unwrap();
        a.feed(&mut source(&ABNORMAL[4..])).unwrap();
        assert_eq!(a.take_frame().unwrap().as_bytes(), &ABNORMAL);
        assert_eq!(b.take_frame().unwrap().as_bytes(), &FALL_REAL);
    }

    #[test]
    fn frame_display_is_hex() {
        let frame = Frame::from_bytes(ABNORMAL.to_vec());
        assert_eq!(frame.to_string(), "55 07 00 04 03 02 79 2E");
        assert_eq!(frame.crc_trailer(), Some(0x792E));
    }

    #[test]
    fn field_access_past_end_is_truncated() {
        let frame = Frame::from_bytes(ABNORMAL.to_vec());
        assert!(matches!(frame.byte(8), Err(Error::Truncated { needed: 9, len: 8 })));
        assert!(matches!(frame.f32_le(6), Err(Error::Truncated { needed: 10, len: 8 })));
    }
}
