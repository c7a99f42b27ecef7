//! Locating the peripheral board among the host's serial ports
//!
//! Every candidate port is probed with a short-lived connection that asks
//! the device to identify itself. Ports that stay silent, answer garbage,
//! or fail to open are skipped; the first port whose reported name matches
//! wins.

use std::time::Duration;

use crate::commands::{decode_string, CMD_DEVICE_NAME, CMD_DEVICE_VERSION};
use crate::error::{Error, Result};
use crate::monitor::SerialMonitor;
use crate::transport::SerialTransport;

/// Identity reported by a responsive device during a scan
#[derive(Debug, Clone)]
pub struct BoardDescriptor {
    pub port: String,
    pub device_name: String,
    pub device_version: String,
}

/// Names of every serial port the host knows about
pub fn candidate_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Connect to one port and ask the device what it is
pub fn probe(
    port: &str,
    baud_rate: u32,
    settle: Duration,
    timeout: Duration,
) -> Result<BoardDescriptor> {
    let transport = SerialTransport::open(port, baud_rate)?;
    let monitor = SerialMonitor::new();
    monitor.connect(transport)?;
    // Boards reset on port open; give the firmware time to come up
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }
    let device_name = decode_string(&monitor.request(CMD_DEVICE_NAME, &[], timeout)?);
    let device_version = decode_string(&monitor.request(CMD_DEVICE_VERSION, &[], timeout)?);
    monitor.stop();

    Ok(BoardDescriptor {
        port: port.to_string(),
        device_name,
        device_version,
    })
}

/// Probe every candidate port, returning descriptors for the responsive ones
pub fn scan(baud_rate: u32, settle: Duration, timeout: Duration) -> Result<Vec<BoardDescriptor>> {
    let mut found = Vec::new();
    for port in candidate_ports()? {
        match probe(&port, baud_rate, settle, timeout) {
            Ok(descriptor) => {
                log::info!(
                    "Discovery: {} identifies as {} {}",
                    port,
                    descriptor.device_name,
                    descriptor.device_version
                );
                found.push(descriptor);
            }
            Err(error) => {
                log::debug!("Discovery: {} did not answer: {}", port, error);
            }
        }
    }
    Ok(found)
}

/// Pick the first descriptor whose device name matches exactly
pub fn first_matching<'a>(
    boards: &'a [BoardDescriptor],
    device_name: &str,
) -> Result<&'a BoardDescriptor> {
    if boards.is_empty() {
        log::warn!("Discovery: no responsive serial devices found");
        return Err(Error::NoDeviceFound);
    }
    boards
        .iter()
        .find(|board| board.device_name == device_name)
        .ok_or_else(|| {
            log::warn!(
                "Discovery: no device named {:?} among {} responsive ports",
                device_name,
                boards.len()
            );
            Error::NoDeviceFound
        })
}

/// Scan all ports and return the port name of the first matching board.
/// All discovery failures collapse to [`Error::NoDeviceFound`].
pub fn find_board(
    device_name: &str,
    baud_rate: u32,
    settle: Duration,
    timeout: Duration,
) -> Result<String> {
    let boards = match scan(baud_rate, settle, timeout) {
        Ok(boards) => boards,
        Err(error) => {
            log::warn!("Discovery: port enumeration failed: {}", error);
            return Err(Error::NoDeviceFound);
        }
    };
    let board = first_matching(&boards, device_name)?;
    log::info!("Discovery: using {} on {}", board.device_name, board.port);
    Ok(board.port.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(port: &str, name: &str) -> BoardDescriptor {
        BoardDescriptor {
            port: port.to_string(),
            device_name: name.to_string(),
            device_version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_no_responsive_ports() {
        let result = first_matching(&[], "mr-box-peripheral-board");
        assert!(matches!(result, Err(Error::NoDeviceFound)));
    }

    #[test]
    fn test_no_matching_name() {
        let boards = vec![descriptor("/dev/ttyUSB0", "other-device")];
        let result = first_matching(&boards, "mr-box-peripheral-board");
        assert!(matches!(result, Err(Error::NoDeviceFound)));
    }

    #[test]
    fn test_first_match_wins() {
        let boards = vec![
            descriptor("/dev/ttyUSB0", "other-device"),
            descriptor("/dev/ttyUSB1", "mr-box-peripheral-board"),
            descriptor("/dev/ttyUSB2", "mr-box-peripheral-board"),
        ];
        let board = first_matching(&boards, "mr-box-peripheral-board").unwrap();
        assert_eq!(board.port, "/dev/ttyUSB1");
    }

    #[test]
    fn test_name_must_match_exactly() {
        let boards = vec![descriptor("/dev/ttyUSB0", "mr-box-peripheral-board-v2")];
        let result = first_matching(&boards, "mr-box-peripheral-board");
        assert!(matches!(result, Err(Error::NoDeviceFound)));
    }
}
