//! Lock-free single-producer single-consumer ring buffer
//!
//! Bridges the OS input hook and the conversion worker. The producer is a
//! hook callback (or device reader thread) that must never block: when the
//! ring is full it overwrites the oldest unread slot. The consumer detects
//! the overrun by observing `write - read > capacity` and skips the
//! clobbered span, counting the lost slots for diagnostics.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ring capacity in slots. Power of two so the slot index is a mask.
pub const RING_CAPACITY: usize = 1024;

/// A bounded SPSC ring. `push` is only called from the producer thread and
/// `pop` only from the consumer thread; the monotonic 64-bit counters make
/// the occupancy arithmetic immune to wrap-around.
pub struct Ring<T> {
    slots: Box<[UnsafeCell<T>]>,
    write: AtomicU64,
    read: AtomicU64,
    overruns: AtomicU64,
}

// Slots are only written by the single producer and read by the single
// consumer; the torn-read window on overrun is handled by the re-check in
// `pop`.
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T: Copy + Default> Ring<T> {
    pub fn new() -> Arc<Self> {
        let slots: Vec<UnsafeCell<T>> = (0..RING_CAPACITY)
            .map(|_| UnsafeCell::new(T::default()))
            .collect();
        Arc::new(Self {
            slots: slots.into_boxed_slice(),
            write: AtomicU64::new(0),
            read: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        })
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Writes a value, overwriting the oldest unread slot when full.
    /// Never blocks. Must only be called from the producer thread.
    pub fn push(&self, value: T) {
        let w = self.write.load(Ordering::Relaxed);
        let idx = (w as usize) & self.mask();
        unsafe { *self.slots[idx].get() = value };
        // Publish after the slot write so the consumer never sees an
        // unwritten slot at a published index.
        self.write.fetch_add(1, Ordering::Release);
    }

    /// Reads the next value, skipping any span the producer has lapped.
    /// Returns `None` when the ring is empty. Must only be called from the
    /// consumer thread.
    pub fn pop(&self) -> Option<T> {
        loop {
            let w = self.write.load(Ordering::Acquire);
            let mut r = self.read.load(Ordering::Relaxed);
            if r == w {
                return None;
            }

            let cap = self.slots.len() as u64;
            if w - r > cap {
                // Producer lapped us: everything below w - cap is gone.
                let lapped = w - cap;
                self.overruns.fetch_add(lapped - r, Ordering::Relaxed);
                r = lapped;
                self.read.store(r, Ordering::Relaxed);
            }

            let idx = (r as usize) & self.mask();
            let value = unsafe { *self.slots[idx].get() };

            // The producer may have wrapped onto this slot mid-read; if so
            // the copy above cannot be trusted, take the next round.
            if self.write.load(Ordering::Acquire) - r > cap {
                continue;
            }

            self.read.store(r + 1, Ordering::Release);
            return Some(value);
        }
    }

    /// Total number of slots lost to overruns since creation.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}
