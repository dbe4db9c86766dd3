//! Radio callback → supervisor loop hand-off.
//!
//! The BLE host stack delivers GAP/GATTS callbacks on its own task.  Those
//! callbacks must never touch session state, so they only translate the
//! callback into a [`RadioEvent`] and push it here.  The supervisor loop is
//! the single consumer and drains the queue once per tick.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GAP callback │────▶│              │     │              │
//! │ GATTS write  │────▶│  EventQueue  │────▶│  Supervisor  │
//! │ MTU exchange │────▶│  (bounded)   │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::link::framer::MAX_RX_CAPACITY;

/// Largest single attribute write we accept from the stack.
pub const MAX_WRITE_LEN: usize = 512;

/// Smallest write a client sends at the default ATT MTU (23 - 3).
const MIN_WRITE_LEN: usize = 20;

/// Queue depth used by the device radio adapter.
///
/// A full-size message written at the default MTU must fit while the
/// supervisor sits in a settle or flush delay, plus room for connection
/// and MTU events around it.
pub const EVENT_QUEUE_CAP: usize = MAX_RX_CAPACITY.div_ceil(MIN_WRITE_LEN) + 6;

/// Raw attribute write payload.
pub type WriteData = heapless::Vec<u8, MAX_WRITE_LEN>;

/// Everything the radio stack can tell the session about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A central connected.
    Connected { conn: u16 },
    /// A central disconnected (or the link was lost).
    Disconnected { conn: u16 },
    /// A client wrote to a characteristic.
    Write {
        conn: u16,
        handle: u16,
        data: WriteData,
    },
    /// ATT MTU exchange completed.
    MtuChanged { conn: u16, mtu: u16 },
    /// One or more events were dropped at this point in the stream
    /// because the queue was full.
    Overflow,
}

impl RadioEvent {
    /// Build a write event, truncating payloads that exceed [`MAX_WRITE_LEN`].
    pub fn write(conn: u16, handle: u16, bytes: &[u8]) -> Self {
        let n = bytes.len().min(MAX_WRITE_LEN);
        let mut data = WriteData::new();
        // Cannot fail: n <= capacity.
        let _ = data.extend_from_slice(&bytes[..n]);
        Self::Write { conn, handle, data }
    }
}

// ── Bounded MPSC queue ────────────────────────────────────────
//
// Backed by an embassy-sync channel guarded by a critical section, so
// it can live in a `static` and be pushed from the stack's callback task.
//
// A failed push raises `overflowed`.  The flag is turned into an
// `Overflow` marker at the position of the gap: ahead of the next event
// that fits, or on `pop` once everything older has been drained.

pub struct EventQueue<const N: usize> {
    inner: Channel<CriticalSectionRawMutex, RadioEvent, N>,
    overflowed: AtomicBool,
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            inner: Channel::new(),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Enqueue an event.
    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: RadioEvent) -> bool {
        if self.overflowed.load(Ordering::Acquire) {
            if self.inner.try_send(RadioEvent::Overflow).is_err() {
                return false;
            }
            self.overflowed.store(false, Ordering::Release);
        }
        if self.inner.try_send(event).is_ok() {
            true
        } else {
            self.overflowed.store(true, Ordering::Release);
            false
        }
    }

    /// Pop the next event, oldest first.
    pub fn pop(&self) -> Option<RadioEvent> {
        match self.inner.try_receive() {
            Ok(event) => Some(event),
            Err(_) => self
                .overflowed
                .swap(false, Ordering::AcqRel)
                .then_some(RadioEvent::Overflow),
        }
    }

    /// Discard everything pending, including a pending overflow.
    pub fn clear(&self) {
        while self.inner.try_receive().is_ok() {}
        self.overflowed.store(false, Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
