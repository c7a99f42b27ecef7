//! LED brightness control
//!
//! Brightness lives host-side as a fraction in `[0.0, 1.0]`; the board
//! only ever sees 8-bit PWM duty cycles. Turning an LED off writes duty
//! zero but keeps the brightness setting, so switching back on restores
//! the previous level.

use crate::board::PeripheralBoard;
use crate::error::{Error, Result};

/// Host-side mirror of one LED channel
#[derive(Debug, Clone, Copy)]
pub(crate) struct LedState {
    pub pin: u8,
    pub brightness: f32,
    pub on: bool,
}

fn validate_brightness(value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "brightness {} out of range [0.0, 1.0]",
            value
        )))
    }
}

fn duty_cycle(brightness: f32, on: bool) -> u8 {
    if on {
        (brightness * 255.0).round() as u8
    } else {
        0
    }
}

/// Handle to one LED channel, borrowed from [`PeripheralBoard`]
pub struct Led<'a> {
    board: &'a PeripheralBoard,
    index: usize,
}

impl<'a> Led<'a> {
    pub(crate) fn new(board: &'a PeripheralBoard, index: usize) -> Self {
        Self { board, index }
    }

    /// Board pin driving this channel
    pub fn pin(&self) -> u8 {
        self.board.led_state(self.index).pin
    }

    /// Last commanded brightness, whether or not the LED is currently on
    pub fn brightness(&self) -> f32 {
        self.board.led_state(self.index).brightness
    }

    pub fn is_on(&self) -> bool {
        self.board.led_state(self.index).on
    }

    /// Change brightness. Values outside `[0.0, 1.0]` are rejected before
    /// anything reaches the board. Takes effect immediately when the LED
    /// is on, otherwise on the next [`Led::set_on`].
    pub fn set_brightness(&self, brightness: f32) -> Result<()> {
        validate_brightness(brightness)?;
        let state = self.board.led_state(self.index);
        if state.on {
            self.board
                .analog_write(state.pin, duty_cycle(brightness, true))?;
        }
        self.board
            .update_led_state(self.index, |led| led.brightness = brightness);
        Ok(())
    }

    /// Switch the LED on or off at the stored brightness
    pub fn set_on(&self, on: bool) -> Result<()> {
        let state = self.board.led_state(self.index);
        self.board
            .analog_write(state.pin, duty_cycle(state.brightness, on))?;
        self.board.update_led_state(self.index, |led| led.on = on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_brightness() {
        assert!(validate_brightness(0.0).is_ok());
        assert!(validate_brightness(0.5).is_ok());
        assert!(validate_brightness(1.0).is_ok());
        assert!(validate_brightness(-0.1).is_err());
        assert!(validate_brightness(1.5).is_err());
        assert!(validate_brightness(f32::NAN).is_err());
    }

    #[test]
    fn test_duty_cycle() {
        assert_eq!(duty_cycle(0.0, true), 0);
        assert_eq!(duty_cycle(1.0, true), 255);
        assert_eq!(duty_cycle(0.5, true), 128);
        assert_eq!(duty_cycle(0.1, true), 26);
        assert_eq!(duty_cycle(1.0, false), 0);
    }
}
