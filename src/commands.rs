//! Command ids and payload conventions shared with the firmware
//!
//! Multi-byte values travel little-endian. Booleans are a single byte,
//! zero for false. Strings are raw UTF-8 with no terminator.

use crate::error::{Error, Result};

// Identity and lifecycle
pub const CMD_DEVICE_NAME: u8 = 0x01;
pub const CMD_DEVICE_VERSION: u8 = 0x02;
pub const CMD_HARDWARE_VERSION: u8 = 0x03;
/// Sent unsolicited by the firmware after every reset
pub const CMD_BOOT_EVENT: u8 = 0x04;

// Raw pin access
pub const CMD_PIN_MODE: u8 = 0x10;
pub const CMD_DIGITAL_WRITE: u8 = 0x11;
pub const CMD_DIGITAL_READ: u8 = 0x12;
pub const CMD_ANALOG_WRITE: u8 = 0x13;
pub const CMD_ANALOG_READ: u8 = 0x14;

// Z-stage
pub const CMD_ZSTAGE_POSITION: u8 = 0x20;
pub const CMD_ZSTAGE_MOVE_TO: u8 = 0x21;
pub const CMD_ZSTAGE_HOME: u8 = 0x22;
pub const CMD_ZSTAGE_MOTOR_ENABLED: u8 = 0x23;
pub const CMD_ZSTAGE_SET_MOTOR_ENABLED: u8 = 0x24;
pub const CMD_ZSTAGE_MICRO_STEPPING: u8 = 0x25;
pub const CMD_ZSTAGE_SET_MICRO_STEPPING: u8 = 0x26;
pub const CMD_ZSTAGE_RPM: u8 = 0x27;
pub const CMD_ZSTAGE_SET_RPM: u8 = 0x28;
pub const CMD_ZSTAGE_HOME_STOP_ENABLED: u8 = 0x29;
pub const CMD_ZSTAGE_SET_HOME_STOP_ENABLED: u8 = 0x2A;
pub const CMD_ZSTAGE_ENGAGED_STOP_ENABLED: u8 = 0x2B;
pub const CMD_ZSTAGE_SET_ENGAGED_STOP_ENABLED: u8 = 0x2C;

// ADC calibration registers
pub const CMD_ADC_SELF_CAL_GAIN: u8 = 0x30;
pub const CMD_ADC_SELF_CAL_OFFSET: u8 = 0x31;
pub const CMD_ADC_SYSTEM_GAIN: u8 = 0x32;
pub const CMD_ADC_SYSTEM_OFFSET: u8 = 0x33;

pub const PIN_MODE_INPUT: u8 = 0x00;
pub const PIN_MODE_OUTPUT: u8 = 0x01;

fn wrong_size(what: &str, expected: usize, payload: &[u8]) -> Error {
    Error::Protocol(format!(
        "expected {} byte {} payload, got {} bytes",
        expected,
        what,
        payload.len()
    ))
}

pub fn decode_empty(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(wrong_size("empty", 0, payload))
    }
}

pub fn decode_bool(payload: &[u8]) -> Result<bool> {
    match payload {
        [value] => Ok(*value != 0),
        _ => Err(wrong_size("bool", 1, payload)),
    }
}

pub fn decode_u8(payload: &[u8]) -> Result<u8> {
    match payload {
        [value] => Ok(*value),
        _ => Err(wrong_size("u8", 1, payload)),
    }
}

pub fn decode_u16(payload: &[u8]) -> Result<u16> {
    let bytes: [u8; 2] = payload
        .try_into()
        .map_err(|_| wrong_size("u16", 2, payload))?;
    Ok(u16::from_le_bytes(bytes))
}

pub fn decode_u32(payload: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| wrong_size("u32", 4, payload))?;
    Ok(u32::from_le_bytes(bytes))
}

pub fn decode_f32(payload: &[u8]) -> Result<f32> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| wrong_size("f32", 4, payload))?;
    Ok(f32::from_le_bytes(bytes))
}

pub fn decode_string(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

pub fn encode_bool(value: bool) -> [u8; 1] {
    [u8::from(value)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bool() {
        assert!(!decode_bool(&[0]).unwrap());
        assert!(decode_bool(&[1]).unwrap());
        assert!(decode_bool(&[0xFF]).unwrap());
        assert!(decode_bool(&[]).is_err());
        assert!(decode_bool(&[1, 2]).is_err());
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_u16(&[0x34, 0x12]).unwrap(), 0x1234);
        assert_eq!(decode_u32(&[0x78, 0x56, 0x34, 0x12]).unwrap(), 0x12345678);
        assert_eq!(decode_f32(&1.5f32.to_le_bytes()).unwrap(), 1.5);
        assert!(decode_u32(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_empty(&[]).is_ok());
        assert!(decode_empty(&[0]).is_err());
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(decode_string(b"mr-box-peripheral-board"), "mr-box-peripheral-board");
        assert_eq!(decode_string(&[]), "");
    }
}
