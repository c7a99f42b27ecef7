//! Wire protocol for the peripheral board RPC link
//!
//! [`frame`] defines the frame layout and checksum, [`decoder`] turns a raw
//! byte stream back into frames. The ring buffer backing the decoder is an
//! implementation detail and stays private.

mod decoder;
mod frame;
mod ring_buffer;

pub use decoder::{Decoder, DecoderStats, RxEvent};
pub use frame::{
    checksum, Frame, FrameKind, CHECKSUM_SIZE, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
    MIN_FRAME_SIZE, PROTOCOL_VERSION, SYNC_BYTE_1, SYNC_BYTE_2,
};
