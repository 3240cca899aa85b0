//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'ottimizzatore video.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di ottimizzazione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `output_dir`: Directory dei file generati (default: `~/.video-optimizer`)
//! - `video_bitrate`: Bitrate video target in bit/s (default: 750000)
//! - `max_short_side`: Lato corto di riferimento per il fattore di scala (default: 360)
//! - `video_codec`: Codec video passato a ffmpeg (default: "mpeg4")
//! - `preview_quality`: Qualità JPEG dell'anteprima (1-100, default: 90)
//! - `progress_interval_ms`: Intervallo della callback di progresso (default: 1000)
//! - `sampler_delay_ms`: Ritardo del primo campionamento statistiche (default: 2000)
//! - `sampler_interval_ms`: Intervallo di campionamento statistiche (default: 1000)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     video_bitrate: 1_000_000,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for video optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory where optimized videos and previews are written
    pub output_dir: PathBuf,
    /// Target video bitrate (bits/s)
    pub video_bitrate: u32,
    /// The shorter video side is divided by an integer factor towards this size
    pub max_short_side: u32,
    /// Video codec used by the transcoding engine
    pub video_codec: String,
    /// JPEG quality of the preview frame (1-100)
    pub preview_quality: u8,
    /// How often the caller's progress callback fires
    pub progress_interval_ms: u64,
    /// Delay before the first engine statistics sample
    pub sampler_delay_ms: u64,
    /// Interval between engine statistics samples
    pub sampler_interval_ms: u64,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            video_bitrate: 750_000,
            max_short_side: 360,
            video_codec: "mpeg4".to_string(),
            preview_quality: 90,
            progress_interval_ms: 1000,
            sampler_delay_ms: 2000,
            sampler_interval_ms: 1000,
            json_output: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".video-optimizer"))
        .unwrap_or_else(|| std::env::temp_dir().join("video-optimizer"))
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.video_bitrate == 0 {
            return Err(anyhow::anyhow!("Video bitrate must be greater than 0"));
        }

        if self.max_short_side == 0 {
            return Err(anyhow::anyhow!("Max short side must be greater than 0"));
        }

        if self.video_codec.trim().is_empty() {
            return Err(anyhow::anyhow!("Video codec must not be empty"));
        }

        if self.preview_quality == 0 || self.preview_quality > 100 {
            return Err(anyhow::anyhow!("Preview quality must be between 1 and 100"));
        }

        if self.progress_interval_ms == 0 || self.sampler_interval_ms == 0 {
            return Err(anyhow::anyhow!("Timer intervals must be greater than 0"));
        }

        if self.output_dir.exists() && !self.output_dir.is_dir() {
            return Err(anyhow::anyhow!("Output path is not a directory: {}", self.output_dir.display()));
        }

        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn sampler_delay(&self) -> Duration {
        Duration::from_millis(self.sampler_delay_ms)
    }

    pub fn sampler_interval(&self) -> Duration {
        Duration::from_millis(self.sampler_interval_ms)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.video_bitrate = 0;
        assert!(config.validate().is_err());

        config.video_bitrate = 750_000;
        config.preview_quality = 101;
        assert!(config.validate().is_err());

        config.preview_quality = 90;
        config.progress_interval_ms = 0;
        assert!(config.validate().is_err());

        config.progress_interval_ms = 1000;
        config.max_short_side = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_dir_must_be_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let config = Config {
            output_dir: file,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.video_bitrate, 750_000);
        assert_eq!(config.max_short_side, 360);
        assert_eq!(config.video_codec, "mpeg4");
        assert_eq!(config.preview_quality, 90);
        assert_eq!(config.progress_interval(), Duration::from_secs(1));
        assert_eq!(config.sampler_delay(), Duration::from_secs(2));
        assert!(!config.json_output);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            output_dir: temp_dir.path().to_path_buf(),
            video_bitrate: 1_200_000,
            video_codec: "libx264".to_string(),
            sampler_interval_ms: 500,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.output_dir, temp_dir.path());
        assert_eq!(loaded_config.video_bitrate, 1_200_000);
        assert_eq!(loaded_config.video_codec, "libx264");
        assert_eq!(loaded_config.sampler_interval_ms, 500);
        assert_eq!(loaded_config.max_short_side, 360);
    }

    #[tokio::test]
    async fn test_missing_config_file_falls_back_to_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("missing.json")).await.unwrap();
        assert_eq!(config.video_bitrate, 750_000);
    }

    #[tokio::test]
    async fn test_partial_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        tokio::fs::write(&config_path, r#"{ "video_bitrate": 500000 }"#).await.unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.video_bitrate, 500_000);
        assert_eq!(config.preview_quality, 90);
    }
}
