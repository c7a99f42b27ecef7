//! Frame layout and checksum for the board protocol
//!
//! Wire format:
//!
//! ```text
//! [0xA5 0x5A] [VER] [KIND] [ID] [CMD] [LEN_L LEN_H] [PAYLOAD...] [CRC_H CRC_L]
//! ```
//!
//! - `VER`: protocol revision; frames carrying any other value are rejected
//! - `KIND`: 0x01 request, 0x02 response, 0x03 device-initiated event
//! - `ID`: correlation id echoed by the device in its response; 0 is
//!   reserved for unsolicited frames
//! - `LEN`: payload length, little-endian u16
//! - `CRC`: big-endian 16-bit checksum over `VER..PAYLOAD` (sync excluded)

/// First sync byte
pub const SYNC_BYTE_1: u8 = 0xA5;
/// Second sync byte
pub const SYNC_BYTE_2: u8 = 0x5A;

/// Protocol revision this build speaks
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Bytes before the payload: sync(2) + ver(1) + kind(1) + id(1) + cmd(1) + len(2)
pub const HEADER_SIZE: usize = 8;
/// Trailing checksum bytes
pub const CHECKSUM_SIZE: usize = 2;

/// Maximum payload the board-side buffers accept
pub const MAX_PAYLOAD_SIZE: usize = 256;
/// Size of the largest possible frame on the wire
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + CHECKSUM_SIZE;
/// Size of a frame with an empty payload
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Direction/role of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Host-initiated command
    Request,
    /// Device reply to a request, echoing its correlation id
    Response,
    /// Device-initiated notification (correlation id 0)
    Event,
}

impl FrameKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameKind::Request),
            0x02 => Some(FrameKind::Response),
            0x03 => Some(FrameKind::Event),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FrameKind::Request => 0x01,
            FrameKind::Response => 0x02,
            FrameKind::Event => 0x03,
        }
    }
}

/// One complete unit of wire data, immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub kind: FrameKind,
    pub packet_id: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a request frame carrying the current protocol version
    pub fn request(packet_id: u8, command: u8, payload: &[u8]) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind: FrameKind::Request,
            packet_id,
            command,
            payload: payload.to_vec(),
        }
    }

    /// Build a response frame (device side; used by tests and simulators)
    pub fn response(packet_id: u8, command: u8, payload: &[u8]) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind: FrameKind::Response,
            packet_id,
            command,
            payload: payload.to_vec(),
        }
    }

    /// Build an unsolicited event frame (correlation id 0)
    pub fn event(command: u8, payload: &[u8]) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind: FrameKind::Event,
            packet_id: 0,
            command,
            payload: payload.to_vec(),
        }
    }

    /// Serialize to wire bytes, computing the trailing checksum
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE);
        buf.push(SYNC_BYTE_1);
        buf.push(SYNC_BYTE_2);
        buf.push(self.version);
        buf.push(self.kind.as_byte());
        buf.push(self.packet_id);
        buf.push(self.command);
        buf.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        let crc = checksum(&buf[2..]);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }
}

/// 16-bit checksum: big-endian word sum with XOR for an odd trailing byte
///
/// # Example
/// ```ignore
/// // checksum(&[0x01]) = 0x0001 (XOR of the single byte)
/// // checksum(&[0x01, 0x02]) = 0x0102
/// // checksum(&[0x01, 0x02, 0x03]) = 0x0102 ^ 0x0003 = 0x0101
/// ```
#[inline]
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        let word = ((data[i] as u16) << 8) | (data[i + 1] as u16);
        sum = sum.wrapping_add(word);
        i += 2;
    }
    if i < data.len() {
        sum ^= data[i] as u16;
    }
    sum
}
