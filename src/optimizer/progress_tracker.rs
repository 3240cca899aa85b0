//! # Progress Tracking Module
//!
//! Percentuale di avanzamento del job in corso, condivisa tra il campionatore
//! delle statistiche dell'encoder (unico writer) e il timer che notifica il
//! chiamante (reader). Un `AtomicU8` basta: un solo job alla volta.

use std::sync::atomic::{AtomicU8, Ordering};

/// Highest value ever published; 100% is signalled only by job completion
pub const MAX_REPORTED_PROGRESS: u8 = 99;

/// Current percentage of the running optimization, in [0, 99]
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percentage: AtomicU8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to 0, at job start
    pub fn reset(&self) {
        self.percentage.store(0, Ordering::Release);
    }

    /// Last published percentage
    pub fn get(&self) -> u8 {
        self.percentage.load(Ordering::Acquire)
    }

    /// Turn the engine's elapsed encode time into a percentage of the total duration.
    ///
    /// Nothing is published when the duration is unknown (0) or when the
    /// estimate reaches 100; published values never decrease within a job.
    /// Returns the value now visible to readers, if this sample published one.
    pub fn sample(&self, elapsed_encode_ms: i64, total_duration_secs: u64) -> Option<u8> {
        if total_duration_secs == 0 || elapsed_encode_ms < 0 {
            return None;
        }

        let total_ms = total_duration_secs.saturating_mul(1000);
        let percentage = (elapsed_encode_ms as u64).saturating_mul(100) / total_ms;
        if percentage > MAX_REPORTED_PROGRESS as u64 {
            return None;
        }

        let previous = self.percentage.fetch_max(percentage as u8, Ordering::AcqRel);
        Some(previous.max(percentage as u8))
    }
}
