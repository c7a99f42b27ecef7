//! Host-side driver for the MR-Box peripheral board
//!
//! The board carries a Z-stage stepper and two PWM LED channels behind a
//! serial RPC link. This crate speaks that link: framing and checksums,
//! one-request-at-a-time transaction handling, connection supervision, and
//! typed facades for the hardware.
//!
//! Layering, bottom to top:
//! - [`transport`]: raw byte streams, real serial port or in-memory mock
//! - [`protocol`]: frame layout, checksum, incremental decoding
//! - [`transaction`]: request/response correlation and deadlines
//! - [`monitor`]: reader thread, connection state, blocking requests
//! - [`board`] and [`device`]: the typed surface applications use
//!
//! ```no_run
//! use mrbox_io::{BoardConfig, PeripheralBoard};
//!
//! fn main() -> mrbox_io::Result<()> {
//!     let board = PeripheralBoard::connect(BoardConfig::default())?;
//!     board.zstage().home()?;
//!     let led = board.led1();
//!     led.set_brightness(0.5)?;
//!     led.set_on(true)?;
//!     board.stop();
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod commands;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod transaction;
pub mod transport;

pub use board::{AdcCalibration, PeripheralBoard, DEVICE_NAME};
pub use config::BoardConfig;
pub use device::{Led, ZStage, ZStageState};
pub use error::{Error, Result};
pub use monitor::{ConnectionState, SerialMonitor};
