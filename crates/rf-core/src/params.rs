//! Parameter types for audio processors

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic parameter for lock-free access
///
/// Stores the f64 bit pattern in an `AtomicU64`. Loads and stores are relaxed;
/// publication ordering is the caller's job (see the epoch counter in rf-insert).
pub struct AtomicParam {
    bits: AtomicU64,
}

impl AtomicParam {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl std::fmt::Debug for AtomicParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicParam").field(&self.get()).finish()
    }
}
