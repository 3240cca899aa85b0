//! # Progress Display Module
//!
//! Barra di avanzamento `indicatif` per la CLI, alimentata dalla callback di
//! progresso dell'ottimizzatore.
//!
//! ## Responsabilità:
//! - Progress bar 0-100 con tempo trascorso e messaggio di stato
//! - Spinner per le operazioni senza percentuale (metadati, anteprima)
//! - Nascosta quando l'output è JSON, per non sporcare stdout
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [██████████████████████░░░░░░░░░░░░░░░░░░]  54% holiday.mov
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar of a single optimization
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a 0-100 bar labelled with `message`
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(100);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Move to `percentage`; the bar never goes back
    pub fn set_percentage(&self, percentage: u8) {
        let position = u64::from(percentage.min(100));
        if position > self.bar.position() {
            self.bar.set_position(position);
        }
    }

    /// Fill the bar and leave `message` on screen
    pub fn finish(&self, message: &str) {
        self.bar.set_position(100);
        self.bar.finish_with_message(message.to_string());
    }

    /// Stop where we are, leaving `message` on screen
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_is_monotonic_and_clamped() {
        let progress = ProgressManager::hidden();
        progress.set_percentage(40);
        progress.set_percentage(10);
        assert_eq!(progress.bar.position(), 40);

        progress.set_percentage(250);
        assert_eq!(progress.bar.position(), 100);
    }

    #[test]
    fn test_finish_fills_the_bar() {
        let progress = ProgressManager::hidden();
        progress.set_percentage(99);
        progress.finish("done");
        assert_eq!(progress.bar.position(), 100);
    }
}
