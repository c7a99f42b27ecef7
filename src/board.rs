//! Top-level facade for the MR-Box peripheral board
//!
//! [`PeripheralBoard`] owns the connection and hands out typed handles to
//! the Z-stage and the two LED channels. Construction verifies the device
//! on the other end actually is the peripheral board before any handle
//! can be used.

use std::time::Duration;

use parking_lot::Mutex;

use crate::commands::{
    decode_bool, decode_empty, decode_string, decode_u16, decode_u32, CMD_ADC_SELF_CAL_GAIN,
    CMD_ADC_SELF_CAL_OFFSET, CMD_ADC_SYSTEM_GAIN, CMD_ADC_SYSTEM_OFFSET, CMD_ANALOG_READ,
    CMD_ANALOG_WRITE, CMD_DEVICE_NAME, CMD_DEVICE_VERSION, CMD_DIGITAL_READ, CMD_DIGITAL_WRITE,
    CMD_HARDWARE_VERSION, CMD_PIN_MODE, PIN_MODE_OUTPUT,
};
use crate::config::BoardConfig;
use crate::device::{Led, LedState, ZStage};
use crate::discovery;
use crate::error::{Error, Result};
use crate::monitor::SerialMonitor;
use crate::transport::{SerialTransport, Transport};

/// Name the firmware reports; anything else is not our board
pub const DEVICE_NAME: &str = "mr-box-peripheral-board";

/// The board reboots when its firmware is replaced; give the bootloader
/// time to hand off before reopening the port.
const REFLASH_BOOT_DELAY: Duration = Duration::from_millis(500);

/// ADC calibration registers as programmed at the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcCalibration {
    pub self_cal_gain: u32,
    pub self_cal_offset: u32,
    pub system_gain: u32,
    pub system_offset: u32,
}

pub struct PeripheralBoard {
    monitor: SerialMonitor,
    config: BoardConfig,
    port: Option<String>,
    leds: Mutex<[LedState; 2]>,
}

impl PeripheralBoard {
    /// Connect using the configured port, or scan every serial port for
    /// the board when none is configured
    pub fn connect(config: BoardConfig) -> Result<Self> {
        match config.connection.port.clone() {
            Some(port) => Self::open(&port, config),
            None => Self::connect_first_matching(config),
        }
    }

    /// Scan candidate ports and connect to the first one that identifies
    /// as the peripheral board, ignoring any configured port
    pub fn connect_first_matching(config: BoardConfig) -> Result<Self> {
        let port = discovery::find_board(
            DEVICE_NAME,
            config.connection.baud_rate,
            config.connection.settle_delay(),
            config.connection.request_timeout(),
        )?;
        Self::open(&port, config)
    }

    /// Connect to the board on a specific port
    pub fn open(port: &str, config: BoardConfig) -> Result<Self> {
        let transport = SerialTransport::open(port, config.connection.baud_rate)?;
        Self::attach(transport, Some(port.to_string()), config)
    }

    /// Attach to an already-open transport. No port name is recorded, so
    /// [`PeripheralBoard::reflash`] is unavailable on boards built this way.
    pub fn from_transport<T: Transport + 'static>(transport: T, config: BoardConfig) -> Result<Self> {
        Self::attach(transport, None, config)
    }

    fn attach<T: Transport + 'static>(
        transport: T,
        port: Option<String>,
        config: BoardConfig,
    ) -> Result<Self> {
        let monitor = SerialMonitor::new();
        monitor.connect(transport)?;
        let leds = config.leds.pins.map(|pin| LedState {
            pin,
            brightness: config.leds.initial_brightness,
            on: false,
        });
        let board = Self {
            monitor,
            config,
            port,
            leds: Mutex::new(leds),
        };
        if let Err(error) = board.settle_and_verify() {
            board.monitor.stop();
            return Err(error);
        }
        Ok(board)
    }

    /// Wait out the post-open reset, check the firmware identifies as our
    /// board, and drive the LEDs to a known state
    fn settle_and_verify(&self) -> Result<()> {
        let settle = self.config.connection.settle_delay();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }
        let name = self.device_name()?;
        if name != DEVICE_NAME {
            log::warn!(
                "Board: device identifies as {:?}, expected {:?}",
                name,
                DEVICE_NAME
            );
            return Err(Error::NoDeviceFound);
        }
        log::info!("Board: connected to {} {}", name, self.device_version()?);
        self.init_leds()
    }

    /// LEDs come up off at the configured initial brightness
    fn init_leds(&self) -> Result<()> {
        for pin in self.config.leds.pins {
            self.pin_mode(pin, PIN_MODE_OUTPUT)?;
            self.analog_write(pin, 0)?;
        }
        let mut leds = self.leds.lock();
        for led in leds.iter_mut() {
            led.on = false;
            led.brightness = self.config.leds.initial_brightness;
        }
        Ok(())
    }

    pub fn zstage(&self) -> ZStage<'_> {
        ZStage::new(self)
    }

    pub fn led1(&self) -> Led<'_> {
        Led::new(self, 0)
    }

    pub fn led2(&self) -> Led<'_> {
        Led::new(self, 1)
    }

    pub fn monitor(&self) -> &SerialMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Port the board was opened on, when known
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn device_name(&self) -> Result<String> {
        Ok(decode_string(&self.request(CMD_DEVICE_NAME, &[])?))
    }

    pub fn device_version(&self) -> Result<String> {
        Ok(decode_string(&self.request(CMD_DEVICE_VERSION, &[])?))
    }

    pub fn hardware_version(&self) -> Result<String> {
        Ok(decode_string(&self.request(CMD_HARDWARE_VERSION, &[])?))
    }

    /// Read the four ADC calibration registers
    pub fn adc_calibration(&self) -> Result<AdcCalibration> {
        Ok(AdcCalibration {
            self_cal_gain: decode_u32(&self.request(CMD_ADC_SELF_CAL_GAIN, &[])?)?,
            self_cal_offset: decode_u32(&self.request(CMD_ADC_SELF_CAL_OFFSET, &[])?)?,
            system_gain: decode_u32(&self.request(CMD_ADC_SYSTEM_GAIN, &[])?)?,
            system_offset: decode_u32(&self.request(CMD_ADC_SYSTEM_OFFSET, &[])?)?,
        })
    }

    pub fn pin_mode(&self, pin: u8, mode: u8) -> Result<()> {
        decode_empty(&self.request(CMD_PIN_MODE, &[pin, mode])?)
    }

    pub fn digital_write(&self, pin: u8, high: bool) -> Result<()> {
        decode_empty(&self.request(CMD_DIGITAL_WRITE, &[pin, u8::from(high)])?)
    }

    pub fn digital_read(&self, pin: u8) -> Result<bool> {
        decode_bool(&self.request(CMD_DIGITAL_READ, &[pin])?)
    }

    pub fn analog_write(&self, pin: u8, duty: u8) -> Result<()> {
        decode_empty(&self.request(CMD_ANALOG_WRITE, &[pin, duty])?)
    }

    pub fn analog_read(&self, pin: u8) -> Result<u16> {
        decode_u16(&self.request(CMD_ANALOG_READ, &[pin])?)
    }

    /// Disconnect and release the port. Handles remain valid but every
    /// request through them fails with [`Error::Disconnected`].
    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Hand the port to a firmware uploader, then bring the board back.
    ///
    /// The connection is torn down first so the uploader gets exclusive
    /// port access. The board is reconnected and verified even when the
    /// upload fails; the upload error is returned once it is back.
    pub fn reflash<F>(&self, upload: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let Some(port) = self.port.clone() else {
            log::error!("Board: cannot reflash without a known port");
            return Err(Error::Disconnected);
        };
        log::info!("Board: releasing {} for firmware upload", port);
        self.monitor.stop();

        let upload_result = upload();
        if let Err(error) = &upload_result {
            log::error!("Board: firmware upload failed: {}", error);
        }
        std::thread::sleep(REFLASH_BOOT_DELAY);

        let transport = SerialTransport::open(&port, self.config.connection.baud_rate)?;
        self.monitor.connect(transport)?;
        self.settle_and_verify()?;
        log::info!("Board: back online after reflash");
        upload_result
    }

    pub(crate) fn request(&self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        self.request_with_timeout(command, payload, self.config.connection.request_timeout())
    }

    pub(crate) fn request_with_timeout(
        &self,
        command: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.monitor.request(command, payload, timeout)
    }

    pub(crate) fn led_state(&self, index: usize) -> LedState {
        self.leds.lock()[index]
    }

    pub(crate) fn update_led_state(&self, index: usize, update: impl FnOnce(&mut LedState)) {
        update(&mut self.leds.lock()[index]);
    }
}
