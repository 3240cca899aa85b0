//! # Video Upload Optimizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `metadata`: Durata, bitrate, dimensioni e anteprima JPEG via ffprobe/ffmpeg
//! - `engine`: Encoder esterno (ffmpeg) con statistiche e cancellazione
//! - `optimizer`: Orchestratore single-flight, callback, timer e path di output
//! - `platform` / `tool_resolver`: Risoluzione dei tool esterni
//! - `file_manager`, `progress`, `json_output`: Supporto alla CLI
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use video_upload_optimizer::{Config, VideoOptimizer};
//!
//! let optimizer = VideoOptimizer::new(Config::default())?;
//! optimizer.optimize_video_for_upload(
//!     "file:///sdcard/DCIM/clip.mp4",
//!     |path| println!("optimized: {}", path.display()),
//!     |error| eprintln!("failed: {}", error),
//!     |percentage| println!("{}%", percentage),
//! )?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod metadata;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod tool_resolver;
pub mod utils;

pub use config::Config;
pub use engine::{EngineOutcome, EngineSession, FfmpegEngine, ReturnCode, TranscodeEngine, TranscodeRequest};
pub use error::OptimizeError;
pub use metadata::{FfprobeProbe, MediaProbe, VideoSize};
pub use optimizer::{JobKey, JobStatus, VideoOptimizer};
