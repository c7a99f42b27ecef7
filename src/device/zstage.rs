//! Z-stage motor control
//!
//! The stage tracks its position in millimeters from the home switch.
//! Setters block until the firmware acknowledges, so a returned `Ok` means
//! the move or setting actually took.

use std::time::Duration;

use crate::board::PeripheralBoard;
use crate::commands::{
    decode_bool, decode_empty, decode_f32, decode_u32, encode_bool, CMD_ZSTAGE_ENGAGED_STOP_ENABLED,
    CMD_ZSTAGE_HOME, CMD_ZSTAGE_HOME_STOP_ENABLED, CMD_ZSTAGE_MICRO_STEPPING,
    CMD_ZSTAGE_MOTOR_ENABLED, CMD_ZSTAGE_MOVE_TO, CMD_ZSTAGE_POSITION, CMD_ZSTAGE_RPM,
    CMD_ZSTAGE_SET_ENGAGED_STOP_ENABLED, CMD_ZSTAGE_SET_HOME_STOP_ENABLED,
    CMD_ZSTAGE_SET_MICRO_STEPPING, CMD_ZSTAGE_SET_MOTOR_ENABLED, CMD_ZSTAGE_SET_RPM,
};
use crate::error::Result;

/// Firmware aborts a homing run after ten seconds; wait a little longer
/// than that before declaring the request lost.
const HOME_TIMEOUT: Duration = Duration::from_secs(12);

/// Snapshot of every Z-stage setting, read in one go
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZStageState {
    pub position: f32,
    pub motor_enabled: bool,
    pub micro_stepping: bool,
    pub rpm: u32,
    pub home_stop_enabled: bool,
    pub engaged_stop_enabled: bool,
}

/// Handle to the board's Z-stage, borrowed from [`PeripheralBoard`]
pub struct ZStage<'a> {
    board: &'a PeripheralBoard,
}

impl<'a> ZStage<'a> {
    pub(crate) fn new(board: &'a PeripheralBoard) -> Self {
        Self { board }
    }

    /// Current position in millimeters
    pub fn position(&self) -> Result<f32> {
        decode_f32(&self.board.request(CMD_ZSTAGE_POSITION, &[])?)
    }

    /// Move to an absolute position, blocking until the stage arrives
    pub fn move_to(&self, position: f32) -> Result<()> {
        decode_empty(&self.board.request(CMD_ZSTAGE_MOVE_TO, &position.to_le_bytes())?)
    }

    /// Drive toward the home switch until it trips, resetting position to
    /// zero. The firmware treats this as a no-op while the home stop is
    /// disabled.
    pub fn home(&self) -> Result<()> {
        decode_empty(&self.board.request_with_timeout(CMD_ZSTAGE_HOME, &[], HOME_TIMEOUT)?)
    }

    /// Raise the stage to the configured up position. Does nothing when
    /// already there.
    pub fn up(&self) -> Result<()> {
        if self.is_up()? {
            return Ok(());
        }
        self.move_to(self.board.config().zstage.up_position)
    }

    /// Lower the stage to the configured down position. Does nothing when
    /// already there.
    pub fn down(&self) -> Result<()> {
        if self.is_down()? {
            return Ok(());
        }
        self.move_to(self.board.config().zstage.down_position)
    }

    /// Whether the stage sits exactly at the configured up position
    pub fn is_up(&self) -> Result<bool> {
        Ok(self.position()? == self.board.config().zstage.up_position)
    }

    /// Whether the stage sits exactly at the configured down position
    pub fn is_down(&self) -> Result<bool> {
        Ok(self.position()? == self.board.config().zstage.down_position)
    }

    pub fn motor_enabled(&self) -> Result<bool> {
        decode_bool(&self.board.request(CMD_ZSTAGE_MOTOR_ENABLED, &[])?)
    }

    pub fn set_motor_enabled(&self, enabled: bool) -> Result<()> {
        decode_empty(&self.board.request(CMD_ZSTAGE_SET_MOTOR_ENABLED, &encode_bool(enabled))?)
    }

    pub fn micro_stepping(&self) -> Result<bool> {
        decode_bool(&self.board.request(CMD_ZSTAGE_MICRO_STEPPING, &[])?)
    }

    pub fn set_micro_stepping(&self, enabled: bool) -> Result<()> {
        decode_empty(&self.board.request(CMD_ZSTAGE_SET_MICRO_STEPPING, &encode_bool(enabled))?)
    }

    /// Motor speed in revolutions per minute
    pub fn rpm(&self) -> Result<u32> {
        decode_u32(&self.board.request(CMD_ZSTAGE_RPM, &[])?)
    }

    pub fn set_rpm(&self, rpm: u32) -> Result<()> {
        decode_empty(&self.board.request(CMD_ZSTAGE_SET_RPM, &rpm.to_le_bytes())?)
    }

    pub fn home_stop_enabled(&self) -> Result<bool> {
        decode_bool(&self.board.request(CMD_ZSTAGE_HOME_STOP_ENABLED, &[])?)
    }

    pub fn set_home_stop_enabled(&self, enabled: bool) -> Result<()> {
        decode_empty(
            &self
                .board
                .request(CMD_ZSTAGE_SET_HOME_STOP_ENABLED, &encode_bool(enabled))?,
        )
    }

    pub fn engaged_stop_enabled(&self) -> Result<bool> {
        decode_bool(&self.board.request(CMD_ZSTAGE_ENGAGED_STOP_ENABLED, &[])?)
    }

    pub fn set_engaged_stop_enabled(&self, enabled: bool) -> Result<()> {
        decode_empty(
            &self
                .board
                .request(CMD_ZSTAGE_SET_ENGAGED_STOP_ENABLED, &encode_bool(enabled))?,
        )
    }

    /// Read every setting. Issues one request per field.
    pub fn state(&self) -> Result<ZStageState> {
        Ok(ZStageState {
            position: self.position()?,
            motor_enabled: self.motor_enabled()?,
            micro_stepping: self.micro_stepping()?,
            rpm: self.rpm()?,
            home_stop_enabled: self.home_stop_enabled()?,
            engaged_stop_enabled: self.engaged_stop_enabled()?,
        })
    }
}
