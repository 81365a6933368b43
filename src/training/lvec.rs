//! Shared weight vector with a per-coordinate lock bit.
//!
//! Each coordinate occupies one `AtomicU64` holding the bit pattern of its
//! `f64` value; the low mantissa bit doubles as the lock flag. Racy reads
//! and writes are ordinary relaxed atomics on the bits, so unlocked
//! (Hogwild) access stays well-defined, and an unsynchronized read may
//! observe a value whose low bit was set by a concurrent lock holder. That
//! is a 1-ulp perturbation and is accepted by the design.
//!
//! There is no global lock: `lock`/`unlock` establish acquire/release
//! ordering per coordinate only.

use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::Array1;

const LOCK_MASK: u64 = 0x1;

/// Fixed-length array of `f64` slots, each with an embedded lock bit.
///
/// The length is set once at construction, before workers exist.
/// Out-of-range indices are a programming error and panic.
#[derive(Debug)]
pub struct LockVec {
    slots: Vec<AtomicU64>,
}

impl LockVec {
    /// A vector of `n` coordinates, all `0.0` and unlocked.
    pub fn zeroed(n: usize) -> Self {
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || AtomicU64::new(0));
        Self { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current bits of slot `i` as an `f64`. Never blocks; may race with
    /// any concurrent writer.
    #[inline]
    pub fn read_unsynchronized(&self, i: usize) -> f64 {
        f64::from_bits(self.slots[i].load(Ordering::Relaxed))
    }

    /// Store `v` into slot `i` without synchronization. May race with any
    /// other operation; must not be mixed with a held lock on `i` (use
    /// [`write_and_unlock`](Self::write_and_unlock) there).
    #[inline]
    pub fn write_unsynchronized(&self, i: usize, v: f64) {
        self.slots[i].store(v.to_bits(), Ordering::Relaxed);
    }

    /// Spin until the lock bit of slot `i` transitions 0 -> 1. Acquire
    /// ordering on success.
    #[inline]
    pub fn lock(&self, i: usize) {
        let slot = &self.slots[i];
        loop {
            let bits = slot.load(Ordering::Relaxed);
            if bits & LOCK_MASK == 0
                && slot
                    .compare_exchange_weak(
                        bits,
                        bits | LOCK_MASK,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Clear the lock bit of slot `i` with release ordering. The caller
    /// must hold the slot.
    #[inline]
    pub fn unlock(&self, i: usize) {
        let slot = &self.slots[i];
        let bits = slot.load(Ordering::Relaxed);
        debug_assert!(bits & LOCK_MASK != 0, "unlock of a slot not held");
        slot.store(bits & !LOCK_MASK, Ordering::Release);
    }

    /// Acquire slot `i` and return its value. The lock stays held; release
    /// it with [`write_and_unlock`](Self::write_and_unlock) or
    /// [`unlock`](Self::unlock).
    #[inline]
    pub fn lock_and_read(&self, i: usize) -> f64 {
        self.lock(i);
        self.read_unsynchronized(i)
    }

    /// Store `v` into slot `i` and release it in one store. The caller must
    /// hold the slot. A read under the lock observes the most recent
    /// `write_and_unlock` on that slot.
    #[inline]
    pub fn write_and_unlock(&self, i: usize, v: f64) {
        self.slots[i].store(v.to_bits() & !LOCK_MASK, Ordering::Release);
    }

    /// Copy all values into a plain vector. The caller guarantees
    /// quiescence (no worker active), e.g. at the round barrier.
    pub fn snapshot(&self) -> Array1<f64> {
        self.slots
            .iter()
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }
}
