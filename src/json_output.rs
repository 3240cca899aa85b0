//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico
//! della CLI (una riga JSON per evento su stdout).
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio ottimizzazione di un video
//! - `metadata`: Durata, bitrate e dimensioni del video
//! - `progress`: Percentuale corrente (0-99)
//! - `preview`: Path del JPEG di anteprima
//! - `complete`: Fine ottimizzazione con dimensioni prima/dopo
//! - `error`: Errore durante l'elaborazione

use crate::config::Config;
use crate::metadata::VideoSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio dell'ottimizzazione
    #[serde(rename = "start")]
    Start {
        input: PathBuf,
        output_dir: PathBuf,
        config: JsonConfig,
    },

    /// Metadati del video sorgente; -1 / null se non leggibili
    #[serde(rename = "metadata")]
    Metadata {
        path: PathBuf,
        duration_seconds: i64,
        bitrate: i32,
        width: Option<u32>,
        height: Option<u32>,
    },

    /// Progresso corrente
    #[serde(rename = "progress")]
    Progress { percentage: u8 },

    /// Anteprima estratta
    #[serde(rename = "preview")]
    Preview { path: PathBuf },

    /// Ottimizzazione completata
    #[serde(rename = "complete")]
    Complete {
        input: PathBuf,
        output: PathBuf,
        original_size: u64,
        optimized_size: u64,
        reduction_percent: f64,
        duration_seconds: f64,
    },

    /// Errore
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub video_bitrate: u32,
    pub max_short_side: u32,
    pub video_codec: String,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio
    pub fn start(input: PathBuf, config: &Config) -> Self {
        Self::Start {
            input,
            output_dir: config.output_dir.clone(),
            config: JsonConfig::from(config),
        }
    }

    /// Crea un messaggio con i metadati
    pub fn metadata(path: PathBuf, duration_seconds: i64, bitrate: i32, size: Option<VideoSize>) -> Self {
        Self::Metadata {
            path,
            duration_seconds,
            bitrate,
            width: size.map(|s| s.width),
            height: size.map(|s| s.height),
        }
    }

    /// Crea un messaggio di progresso
    pub fn progress(percentage: u8) -> Self {
        Self::Progress { percentage }
    }

    pub fn preview(path: PathBuf) -> Self {
        Self::Preview { path }
    }

    /// Crea un messaggio di completamento
    pub fn complete(
        input: PathBuf,
        output: PathBuf,
        original_size: u64,
        optimized_size: u64,
        duration_seconds: f64,
    ) -> Self {
        Self::Complete {
            input,
            output,
            original_size,
            optimized_size,
            reduction_percent: crate::file_manager::FileManager::calculate_reduction(original_size, optimized_size),
            duration_seconds,
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            video_bitrate: config.video_bitrate,
            max_short_side: config.max_short_side,
            video_codec: config.video_codec.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_messages_are_tagged() {
        let json = serde_json::to_string(&JsonMessage::progress(42)).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["percentage"], 42);
    }

    #[test]
    fn test_metadata_without_size() {
        let message = JsonMessage::metadata(PathBuf::from("a.mp4"), -1, -1, None);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "metadata");
        assert_eq!(value["duration_seconds"], -1);
        assert!(value["width"].is_null());
    }

    #[test]
    fn test_complete_reports_reduction() {
        let message = JsonMessage::complete(PathBuf::from("in.mov"), PathBuf::from("out.mp4"), 1000, 250, 3.5);
        match message {
            JsonMessage::Complete { reduction_percent, .. } => assert_eq!(reduction_percent, 75.0),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_start_carries_config() {
        let config = Config::default();
        let value = serde_json::to_value(JsonMessage::start(PathBuf::from("in.mov"), &config)).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["video_bitrate"], 750_000);
        assert_eq!(value["config"]["video_codec"], "mpeg4");
    }
}
