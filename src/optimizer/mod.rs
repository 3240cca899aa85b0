//! # Optimizer Module
//!
//! Modulo che separa le responsabilità dell'ottimizzazione in sottomoduli:
//! - `video_optimizer`: Orchestratore single-flight
//! - `callback_registry`: Callback terminali per job, consegnate una sola volta
//! - `completion`: Contesto di esecuzione delle callback del chiamante
//! - `path_allocator`: Path di output univoci basati su timestamp
//! - `progress_tracker`: Percentuale di avanzamento condivisa
//! - `timers`: Poller del progresso e campionatore delle statistiche

pub mod callback_registry;
pub mod completion;
pub mod path_allocator;
pub mod progress_tracker;
pub mod timers;
pub mod video_optimizer;

pub use callback_registry::{CallbackRegistry, JobKey};
pub use completion::{CompletionContext, InlineContext, SerialQueue};
pub use path_allocator::{Clock, PathAllocator, SystemClock};
pub use progress_tracker::ProgressTracker;
pub use video_optimizer::{JobStatus, VideoOptimizer};
