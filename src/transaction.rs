//! Request/response correlation
//!
//! The board answers exactly one request at a time, so the link is kept
//! strictly half-duplex from the host side: [`TransactionManager::begin`]
//! hands out a [`Transaction`] only once the previous one has finished,
//! and callers queue on the internal lock in arrival order.
//!
//! Each transaction owns a completion channel. The reader thread fulfills
//! it through [`TransactionManager::on_response`]; if the caller gives up
//! first, dropping the [`Transaction`] retires its slot so a late response
//! has nowhere to land and gets logged as unsolicited.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::protocol::Frame;

type Completion = std::result::Result<Frame, Error>;

struct PendingSlot {
    packet_id: u8,
    completion: mpsc::Sender<Completion>,
    issued_at: Instant,
}

/// Hands out packet ids and routes responses back to their waiters
pub struct TransactionManager {
    txn_lock: Mutex<()>,
    pending: Mutex<Option<PendingSlot>>,
    next_id: AtomicU8,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            txn_lock: Mutex::new(()),
            pending: Mutex::new(None),
            next_id: AtomicU8::new(1),
        }
    }

    /// Claim the link for one request. Blocks while another transaction is
    /// in flight.
    pub fn begin(&self) -> Transaction<'_> {
        let guard = self.txn_lock.lock();
        let packet_id = self.allocate_id();
        let (tx, rx) = mpsc::channel();
        *self.pending.lock() = Some(PendingSlot {
            packet_id,
            completion: tx,
            issued_at: Instant::now(),
        });
        Transaction {
            manager: self,
            _guard: guard,
            packet_id,
            completion_rx: rx,
        }
    }

    /// Deliver a response frame to the waiter it belongs to, if any
    pub fn on_response(&self, frame: Frame) {
        let mut pending = self.pending.lock();
        match pending.as_ref() {
            Some(slot) if slot.packet_id == frame.packet_id => {
                let slot = pending.take();
                drop(pending);
                if let Some(slot) = slot {
                    log::debug!(
                        "TransactionManager: packet {} answered in {:?}",
                        slot.packet_id,
                        slot.issued_at.elapsed()
                    );
                    // Waiter may have timed out between our check and this
                    // send; that is fine, the response is simply dropped.
                    let _ = slot.completion.send(Ok(frame));
                }
            }
            _ => {
                log::warn!(
                    "TransactionManager: unsolicited response (packet id {}, command {:#04x}), dropping",
                    frame.packet_id,
                    frame.command
                );
            }
        }
    }

    /// Fail the in-flight transaction, if any. Used when the link drops.
    pub fn fail_pending(&self, error: Error) {
        let slot = self.pending.lock().take();
        if let Some(slot) = slot {
            let _ = slot.completion.send(Err(error));
        }
    }

    /// Packet id 0 is reserved for unsolicited frames
    fn allocate_id(&self) -> u8 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    fn retire(&self, packet_id: u8) {
        let mut pending = self.pending.lock();
        if pending.as_ref().map(|slot| slot.packet_id) == Some(packet_id) {
            *pending = None;
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One in-flight request, holding the link until dropped
pub struct Transaction<'a> {
    manager: &'a TransactionManager,
    _guard: MutexGuard<'a, ()>,
    packet_id: u8,
    completion_rx: mpsc::Receiver<Completion>,
}

impl Transaction<'_> {
    pub fn packet_id(&self) -> u8 {
        self.packet_id
    }

    /// Block until the response arrives, the deadline passes, or the link
    /// fails the transaction
    pub fn wait(self, timeout: Duration) -> Result<Frame> {
        match self.completion_rx.recv_timeout(timeout) {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(error)) => Err(error),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.manager.retire(self.packet_id);
    }
}
