//! Incremental frame parser with resynchronization
//!
//! Bytes are fed in as they arrive off the wire; complete, checksum-valid
//! frames come out. Corruption is absorbed here: on a checksum mismatch or
//! an implausible length field the parser discards a single byte and
//! rescans for the sync pair, so one mangled frame never blocks the frames
//! behind it. A truncated frame at the end of the stream stays buffered
//! until the rest of it arrives.
//!
//! Version enforcement also lives here: a structurally valid frame whose
//! version byte disagrees with [`PROTOCOL_VERSION`] is consumed whole and
//! reported as [`RxEvent::VersionMismatch`], never delivered as a frame.

use super::frame::{
    checksum, Frame, FrameKind, CHECKSUM_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION,
    SYNC_BYTE_1, SYNC_BYTE_2,
};
use super::ring_buffer::RingBuffer;

/// One parse outcome from [`Decoder::push`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// A complete frame with valid checksum and matching protocol version
    Frame(Frame),
    /// A well-formed frame from an incompatible protocol revision
    VersionMismatch { actual: u8 },
}

/// Counters exposed for diagnostics; corruption is never surfaced per-byte
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub checksum_errors: u64,
    pub version_rejects: u64,
    pub bytes_discarded: u64,
}

/// Ring-buffer backed parser retaining partial state between pushes
pub struct Decoder {
    buffer: RingBuffer<2048>,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed bytes and collect every event completed by them
    pub fn push(&mut self, data: &[u8]) -> Vec<RxEvent> {
        self.buffer.extend(data);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    fn next_event(&mut self) -> Option<RxEvent> {
        loop {
            if self.buffer.len() < 2 {
                return None;
            }

            let Some(sync_idx) = self.buffer.find_pair(SYNC_BYTE_1, SYNC_BYTE_2) else {
                // No sync pair anywhere. Drop everything except a trailing
                // first sync byte that may pair with the next push.
                let keep = usize::from(self.buffer.get(self.buffer.len() - 1) == Some(SYNC_BYTE_1));
                self.discard(self.buffer.len() - keep);
                return None;
            };
            if sync_idx > 0 {
                self.discard(sync_idx);
            }

            if self.buffer.len() < HEADER_SIZE {
                return None;
            }

            let payload_len = u16::from_le_bytes([
                self.buffer.get(6).unwrap_or(0),
                self.buffer.get(7).unwrap_or(0),
            ]) as usize;

            if payload_len > MAX_PAYLOAD_SIZE {
                log::warn!(
                    "Decoder: implausible payload length {} in header, resyncing",
                    payload_len
                );
                self.discard(1);
                continue;
            }

            let total_len = HEADER_SIZE + payload_len + CHECKSUM_SIZE;
            if self.buffer.len() < total_len {
                // Truncated frame stays buffered until more bytes arrive
                return None;
            }

            let received = u16::from_be_bytes([
                self.buffer.get(total_len - 2).unwrap_or(0),
                self.buffer.get(total_len - 1).unwrap_or(0),
            ]);
            let computed = match self.buffer.get_slice(2, total_len - 2 - CHECKSUM_SIZE) {
                Some(body) => checksum(body),
                None => {
                    self.discard(1);
                    continue;
                }
            };

            if computed != received {
                self.stats.checksum_errors += 1;
                log::warn!(
                    "Decoder: checksum mismatch (computed {:#06x}, received {:#06x}), resyncing",
                    computed,
                    received
                );
                // Advance past the first sync byte only; the length field
                // itself may be corrupt.
                self.discard(1);
                continue;
            }

            let version = self.buffer.get(2).unwrap_or(0);
            if version != PROTOCOL_VERSION {
                self.stats.version_rejects += 1;
                log::warn!(
                    "Decoder: rejecting frame with protocol version {:#04x} (expected {:#04x})",
                    version,
                    PROTOCOL_VERSION
                );
                self.buffer.advance(total_len);
                return Some(RxEvent::VersionMismatch { actual: version });
            }

            let kind_byte = self.buffer.get(3).unwrap_or(0);
            let Some(kind) = FrameKind::from_byte(kind_byte) else {
                log::warn!(
                    "Decoder: unknown frame kind {:#04x}, dropping frame",
                    kind_byte
                );
                self.discard(total_len);
                continue;
            };

            let packet_id = self.buffer.get(4).unwrap_or(0);
            let command = self.buffer.get(5).unwrap_or(0);
            let payload = match self.buffer.get_slice(HEADER_SIZE, payload_len) {
                Some(data) => data.to_vec(),
                None => Vec::new(),
            };

            self.buffer.advance(total_len);
            self.stats.frames_decoded += 1;
            return Some(RxEvent::Frame(Frame {
                version,
                kind,
                packet_id,
                command,
                payload,
            }));
        }
    }

    fn discard(&mut self, n: usize) {
        self.buffer.advance(n);
        self.stats.bytes_discarded += n as u64;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
