//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Distingue gli errori sincroni (es. `InvalidState`) da quelli consegnati
//!   tramite la callback `on_failure`
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `InvalidState`: Nuova ottimizzazione richiesta mentre un'altra è in corso
//! - `EngineFailure`: L'encoder esterno ha restituito un codice di errore
//! - `EngineCancelled`: L'encoder esterno è stato interrotto
//! - `MetadataUnavailable`: Durata/dimensioni del video non leggibili
//! - `UnsupportedPlatform`: ffmpeg/ffprobe non disponibili
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori di codifica del frame di anteprima
//! - `Validation`: Errori di validazione della configurazione
//! - `RuntimeUnavailable`: Ottimizzatore creato fuori da un runtime tokio
//!
//! ## Esempio:
//! ```rust,ignore
//! match optimizer.optimize_video_for_upload(&video, on_complete, on_failure, on_progress) {
//!     Err(OptimizeError::InvalidState) => warn!("wait for the running optimization"),
//!     Err(e) => return Err(e.into()),
//!     Ok(key) => info!("started {}", key),
//! }
//! ```

/// Custom error types for video optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("A video optimization is already running: wait for it to finish before starting another one")]
    InvalidState,

    #[error("Transcoding engine failed with code {code}: {output}")]
    EngineFailure { code: i32, output: String },

    #[error("Transcoding engine was cancelled")]
    EngineCancelled,

    #[error("Video metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Video optimization is not supported on this platform")]
    UnsupportedPlatform,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("No tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}

impl OptimizeError {
    /// True for the errors produced by the engine stopping early on request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::EngineCancelled)
    }
}
