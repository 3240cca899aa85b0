//! # File Management Module
//!
//! Questo modulo raccoglie le utilità sui file usate dalla CLI.
//!
//! ## Responsabilità:
//! - Determinazione formato file (video supportati in ingresso)
//! - Lettura della dimensione di input e output
//! - Formattazione human-readable delle dimensioni
//! - Calcolo della percentuale di riduzione dopo l'ottimizzazione
//!
//! ## Formati video riconosciuti:
//! MP4, MOV, M4V, 3GP, AVI, MKV, WebM
//!
//! ## Esempio:
//! ```rust,ignore
//! let original = FileManager::get_file_size(&input).await?;
//! let optimized = FileManager::get_file_size(&output).await?;
//! info!("saved {:.1}%", FileManager::calculate_reduction(original, optimized));
//! ```

use anyhow::Result;
use std::path::Path;
use tokio::fs;

/// File helpers for the command line front end
pub struct FileManager;

impl FileManager {
    /// Check if a file looks like a video by its extension
    pub fn is_video(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(
                ext_lower.as_str(),
                "mp4" | "mov" | "m4v" | "3gp" | "avi" | "mkv" | "webm"
            )
        } else {
            false
        }
    }

    /// Size of a file in bytes
    pub async fn get_file_size(path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(anyhow::anyhow!("Not a regular file: {}", path.display()));
        }
        Ok(metadata.len())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction (negative when the file grew)
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
