// Lock-free f64 cell
//
// Telemetry shared between the encoder callback, the control loop, and
// external readers. Single-writer per cell; readers only ever load.

use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Monotonic max update, retried on contention.
    pub fn fetch_max(&self, value: f64) {
        let _ = self.0.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            let current = f64::from_bits(bits);
            (value > current).then(|| value.to_bits())
        });
    }
}
