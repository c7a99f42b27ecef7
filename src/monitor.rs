//! Connection lifecycle and request dispatch
//!
//! [`SerialMonitor`] owns the link to the board: a background reader thread
//! drains the transport through a [`Decoder`] and routes frames, while
//! callers on any thread issue blocking requests through
//! [`SerialMonitor::request`]. The whole surface takes `&self`, so one
//! monitor can be shared across threads and [`SerialMonitor::stop`] can
//! interrupt a request blocked on another thread.
//!
//! Reconnection is deliberately the caller's job. When the link drops the
//! monitor fails whatever was in flight, moves to `Disconnected`, and waits
//! to be told to connect again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::commands::CMD_BOOT_EVENT;
use crate::error::{Error, Result};
use crate::protocol::{Decoder, Frame, FrameKind, RxEvent, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use crate::transaction::TransactionManager;
use crate::transport::{SerialTransport, Transport};

/// Reader thread sleep when the transport has nothing for us
const POLL_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Terminating,
}

/// State shared between the caller-facing handle and the reader thread
struct Shared {
    transactions: TransactionManager,
    state: Mutex<ConnectionState>,
    subscribers: Mutex<Vec<mpsc::Sender<ConnectionState>>>,
}

impl Shared {
    fn set_state(&self, new: ConnectionState) {
        let mut state = self.state.lock();
        if *state == new {
            return;
        }
        *state = new;
        drop(state);
        self.notify(new);
    }

    /// Push a state to every live subscriber, pruning the dead ones
    fn notify(&self, state: ConnectionState) {
        self.subscribers.lock().retain(|tx| tx.send(state).is_ok());
    }

    /// Repeat the `Connected` announcement without a state change. Used
    /// when the device reboots under an established link.
    fn reannounce_connected(&self) {
        if *self.state.lock() == ConnectionState::Connected {
            self.notify(ConnectionState::Connected);
        }
    }
}

/// Live connection resources, present only between connect and stop
struct Link {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// Transactional serial connection to the peripheral board
pub struct SerialMonitor {
    shared: Arc<Shared>,
    link: Mutex<Option<Link>>,
}

impl SerialMonitor {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                transactions: TransactionManager::new(),
                state: Mutex::new(ConnectionState::Disconnected),
                subscribers: Mutex::new(Vec::new()),
            }),
            link: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Register for state notifications. Only emissions after this call are
    /// delivered; the current state is never replayed.
    pub fn subscribe(&self) -> mpsc::Receiver<ConnectionState> {
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Attach to a transport and start the reader thread. Any existing
    /// connection is stopped first.
    pub fn connect<T: Transport + 'static>(&self, transport: T) -> Result<()> {
        self.stop();
        self.shared.set_state(ConnectionState::Connecting);

        let transport: Arc<Mutex<Box<dyn Transport>>> = Arc::new(Mutex::new(Box::new(transport)));
        let shutdown = Arc::new(AtomicBool::new(false));

        let spawn_result = std::thread::Builder::new().name("board-reader".into()).spawn({
            let transport = Arc::clone(&transport);
            let shutdown = Arc::clone(&shutdown);
            let shared = Arc::clone(&self.shared);
            move || reader_loop(transport, shutdown, shared)
        });
        let handle = match spawn_result {
            Ok(handle) => handle,
            Err(error) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(error.into());
            }
        };

        *self.link.lock() = Some(Link {
            transport,
            shutdown,
            reader: Some(handle),
        });
        self.shared.set_state(ConnectionState::Connected);
        Ok(())
    }

    /// Open a serial port and attach to it
    pub fn connect_serial(&self, port: &str, baud_rate: u32) -> Result<()> {
        let transport = SerialTransport::open(port, baud_rate)?;
        self.connect(transport)
    }

    /// Send one command and block for its response.
    ///
    /// Requests from all threads are serialized; at most one is on the wire
    /// at a time. Once `timeout` passes the call returns [`Error::Timeout`]
    /// and a response arriving later is logged and dropped.
    pub fn request(&self, command: u8, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidArgument(format!(
                "payload length {} exceeds {} bytes",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let txn = self.shared.transactions.begin();
        let transport = {
            let link = self.link.lock();
            let Some(link) = link.as_ref() else {
                return Err(Error::Disconnected);
            };
            if *self.shared.state.lock() != ConnectionState::Connected {
                return Err(Error::Disconnected);
            }
            Arc::clone(&link.transport)
        };

        let bytes = Frame::request(txn.packet_id(), command, payload).encode();
        let write_result = {
            let mut io = transport.lock();
            match io.write_all(&bytes) {
                Ok(()) => io.flush(),
                Err(error) => Err(error),
            }
        };
        // Drop our transport handle before blocking so stop() can release
        // the port while we wait.
        drop(transport);

        if let Err(error) = write_result {
            log::error!("SerialMonitor: write failed: {}", error);
            self.fail_link();
            return Err(error);
        }
        log::debug!(
            "SerialMonitor: sent command {:#04x} ({} byte payload)",
            command,
            payload.len()
        );

        let response = txn.wait(timeout)?;
        Ok(response.payload)
    }

    /// Shut down the connection: signal the reader, join it, fail anything
    /// in flight, and release the port. Safe to call repeatedly and from
    /// any thread, including while another thread is blocked in
    /// [`SerialMonitor::request`].
    pub fn stop(&self) {
        let Some(mut link) = self.link.lock().take() else {
            return;
        };
        log::info!("SerialMonitor: stopping");
        self.shared.set_state(ConnectionState::Terminating);
        link.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = link.reader.take() {
            if handle.join().is_err() {
                log::error!("SerialMonitor: reader thread panicked");
            }
        }
        // Reader has exited, so this drop closes the port.
        drop(link);
        self.shared.transactions.fail_pending(Error::Disconnected);
        self.shared.set_state(ConnectionState::Disconnected);
        log::info!("SerialMonitor: stopped, port released");
    }

    /// Mark the link dead after a transport error on the request path. The
    /// reader is told to exit but joined later by stop or drop.
    fn fail_link(&self) {
        if let Some(link) = self.link.lock().as_ref() {
            link.shutdown.store(true, Ordering::Relaxed);
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl Default for SerialMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reader_loop(
    transport: Arc<Mutex<Box<dyn Transport>>>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
) {
    let mut decoder = Decoder::new();
    let mut buf = [0u8; 256];
    log::debug!("Reader: thread started");

    while !shutdown.load(Ordering::Relaxed) {
        let read_result = transport.lock().read(&mut buf);
        match read_result {
            Ok(0) => std::thread::sleep(POLL_SLEEP),
            Ok(n) => {
                for event in decoder.push(&buf[..n]) {
                    handle_rx_event(&shared, event);
                }
            }
            Err(error) => {
                log::error!("Reader: transport failed: {}", error);
                shared.transactions.fail_pending(Error::Disconnected);
                shared.set_state(ConnectionState::Disconnected);
                break;
            }
        }
    }
    log::debug!("Reader: thread exiting");
}

fn handle_rx_event(shared: &Shared, event: RxEvent) {
    match event {
        RxEvent::Frame(frame) => match frame.kind {
            FrameKind::Response => shared.transactions.on_response(frame),
            FrameKind::Event => handle_event_frame(shared, &frame),
            FrameKind::Request => {
                log::warn!(
                    "Reader: request frame from device (command {:#04x}), dropping",
                    frame.command
                );
            }
        },
        RxEvent::VersionMismatch { actual } => {
            shared.transactions.fail_pending(Error::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual,
            });
        }
    }
}

fn handle_event_frame(shared: &Shared, frame: &Frame) {
    if frame.command == CMD_BOOT_EVENT {
        // The device rebooted under us. Whatever was in flight is gone;
        // subscribers get a fresh Connected announcement so they can rerun
        // their setup.
        log::warn!("Reader: device reset detected");
        shared.transactions.fail_pending(Error::Disconnected);
        shared.reannounce_connected();
    } else {
        log::debug!(
            "Reader: unsolicited event {:#04x} ({} byte payload), dropping",
            frame.command,
            frame.payload.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::time::Instant;

    /// Wire an echo device onto the mock: every request frame is answered
    /// with a response carrying the same command and payload.
    fn echo_device(mock: &MockTransport) {
        let mut decoder = Decoder::new();
        mock.set_responder(move |data| {
            let mut out = Vec::new();
            for event in decoder.push(data) {
                if let RxEvent::Frame(frame) = event {
                    if frame.kind == FrameKind::Request {
                        out.extend(
                            Frame::response(frame.packet_id, frame.command, &frame.payload)
                                .encode(),
                        );
                    }
                }
            }
            out
        });
    }

    fn connected_monitor(mock: &MockTransport) -> SerialMonitor {
        let monitor = SerialMonitor::new();
        monitor.connect(mock.clone()).unwrap();
        monitor
    }

    #[test]
    fn test_request_round_trip() {
        let mock = MockTransport::new();
        echo_device(&mock);
        let monitor = connected_monitor(&mock);

        let payload = monitor
            .request(0x42, &[1, 2, 3], Duration::from_secs(1))
            .unwrap();
        assert_eq!(payload, vec![1, 2, 3]);
        monitor.stop();
    }

    #[test]
    fn test_request_without_connection() {
        let monitor = SerialMonitor::new();
        let result = monitor.request(0x01, &[], Duration::from_millis(100));
        assert!(matches!(result, Err(Error::Disconnected)));
    }

    #[test]
    fn test_oversized_payload_rejected_before_write() {
        let mock = MockTransport::new();
        echo_device(&mock);
        let monitor = connected_monitor(&mock);
        mock.clear_written();

        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = monitor.request(0x13, &payload, Duration::from_secs(1));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(mock.get_written().is_empty());
    }

    #[test]
    fn test_timeout_then_recovery() {
        let mock = MockTransport::new();
        let monitor = connected_monitor(&mock);

        let start = Instant::now();
        let result = monitor.request(0x20, &[], Duration::from_millis(50));
        let elapsed = start.elapsed();
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500));

        // The link stays usable once the device starts answering
        echo_device(&mock);
        let payload = monitor
            .request(0x21, &[9], Duration::from_secs(1))
            .unwrap();
        assert_eq!(payload, vec![9]);
    }

    #[test]
    fn test_stop_unblocks_blocked_request() {
        let mock = MockTransport::new();
        let monitor = Arc::new(connected_monitor(&mock));

        let stopper = {
            let monitor = Arc::clone(&monitor);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                monitor.stop();
            })
        };

        let start = Instant::now();
        let result = monitor.request(0x20, &[], Duration::from_secs(10));
        assert!(matches!(result, Err(Error::Disconnected)));
        assert!(start.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_idempotent() {
        let mock = MockTransport::new();
        echo_device(&mock);
        let monitor = connected_monitor(&mock);
        monitor.stop();
        monitor.stop();
        monitor.stop();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_transport_failure_moves_to_disconnected() {
        let mock = MockTransport::new();
        let monitor = connected_monitor(&mock);
        mock.set_fail_reads(true);

        let deadline = Instant::now() + Duration::from_secs(1);
        while monitor.state() != ConnectionState::Disconnected {
            assert!(Instant::now() < deadline, "reader never noticed the failure");
            std::thread::sleep(Duration::from_millis(5));
        }
        let result = monitor.request(0x20, &[], Duration::from_millis(100));
        assert!(matches!(result, Err(Error::Disconnected)));
    }

    #[test]
    fn test_version_mismatch_fails_request() {
        let mock = MockTransport::new();
        let mut decoder = Decoder::new();
        mock.set_responder(move |data| {
            let mut out = Vec::new();
            for event in decoder.push(data) {
                if let RxEvent::Frame(request) = event {
                    let foreign = Frame {
                        version: 0x02,
                        kind: FrameKind::Response,
                        packet_id: request.packet_id,
                        command: request.command,
                        payload: vec![],
                    };
                    out.extend(foreign.encode());
                }
            }
            out
        });
        let monitor = connected_monitor(&mock);

        let result = monitor.request(0x01, &[], Duration::from_secs(1));
        assert!(matches!(
            result,
            Err(Error::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: 0x02
            })
        ));
    }

    #[test]
    fn test_boot_event_fails_in_flight_and_reannounces() {
        let mock = MockTransport::new();
        let mut decoder = Decoder::new();
        mock.set_responder(move |data| {
            let mut out = Vec::new();
            for event in decoder.push(data) {
                if matches!(event, RxEvent::Frame(_)) {
                    out.extend(Frame::event(CMD_BOOT_EVENT, &[]).encode());
                }
            }
            out
        });
        let monitor = connected_monitor(&mock);
        let states = monitor.subscribe();

        let result = monitor.request(0x20, &[], Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Disconnected)));
        assert_eq!(
            states.recv_timeout(Duration::from_secs(1)).unwrap(),
            ConnectionState::Connected
        );
    }

    #[test]
    fn test_unsolicited_frames_do_not_disturb_requests() {
        let mock = MockTransport::new();
        echo_device(&mock);
        let monitor = connected_monitor(&mock);

        // A stray response and a stray unknown event arrive while idle
        mock.inject_read(&Frame::response(77, 0x33, &[1]).encode());
        mock.inject_read(&Frame::event(0x7E, &[5, 5]).encode());
        std::thread::sleep(Duration::from_millis(50));

        let payload = monitor
            .request(0x27, &[4, 3, 2, 1], Duration::from_secs(1))
            .unwrap();
        assert_eq!(payload, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_state_sequence_over_lifecycle() {
        let mock = MockTransport::new();
        echo_device(&mock);
        let monitor = SerialMonitor::new();
        let states = monitor.subscribe();

        monitor.connect(mock.clone()).unwrap();
        monitor.stop();

        let mut seen = Vec::new();
        while let Ok(state) = states.recv_timeout(Duration::from_millis(100)) {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Terminating,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[test]
    fn test_requests_never_overlap() {
        use std::sync::atomic::AtomicI32;

        let mock = MockTransport::new();
        let in_flight = Arc::new(AtomicI32::new(0));
        let overlaps = Arc::new(AtomicI32::new(0));

        let mut decoder = Decoder::new();
        let reply_mock = mock.clone();
        let responder_in_flight = Arc::clone(&in_flight);
        mock.set_responder(move |data| {
            for event in decoder.push(data) {
                if let RxEvent::Frame(request) = event {
                    responder_in_flight.fetch_add(1, Ordering::SeqCst);
                    let reply_mock = reply_mock.clone();
                    let in_flight = Arc::clone(&responder_in_flight);
                    // Delay the reply off-thread so the transport lock is
                    // not held while we sleep
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(60));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        reply_mock.inject_read(
                            &Frame::response(request.packet_id, request.command, &request.payload)
                                .encode(),
                        );
                    });
                }
            }
            Vec::new()
        });

        let monitor = Arc::new(connected_monitor(&mock));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..2 {
            let monitor = Arc::clone(&monitor);
            let in_flight = Arc::clone(&in_flight);
            let overlaps = Arc::clone(&overlaps);
            handles.push(std::thread::spawn(move || {
                if in_flight.load(Ordering::SeqCst) > 1 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                monitor
                    .request(0x20, &[1], Duration::from_secs(2))
                    .unwrap();
                if in_flight.load(Ordering::SeqCst) > 1 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        // Two 60 ms device turnarounds cannot complete faster than their sum
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
