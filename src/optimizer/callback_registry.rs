//! # Callback Registry Module
//!
//! Associa ogni job (identificato dal nome del file di input, senza path)
//! alla coppia di callback successo/errore del chiamante.
//! Il dispatch rimuove la entry: ogni registrazione viene consegnata al
//! massimo una volta, e le entry non si accumulano.

use crate::error::OptimizeError;
use crate::optimizer::completion::CompletionContext;
use crate::utils::base_name;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Success handler, receives the optimized video path
pub type OnComplete = Box<dyn FnOnce(PathBuf) + Send + 'static>;
/// Failure handler, receives the reason
pub type OnFailure = Box<dyn FnOnce(OptimizeError) + Send + 'static>;

/// Base name of the input video; routes the engine's completion back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey(String);

impl JobKey {
    pub fn from_path(input: &Path) -> Self {
        Self(base_name(input))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CallbackEntry {
    on_success: OnComplete,
    on_failure: OnFailure,
}

/// Pending terminal callbacks, keyed by `JobKey`
pub struct CallbackRegistry {
    entries: Mutex<HashMap<JobKey, CallbackEntry>>,
    context: Arc<dyn CompletionContext>,
}

impl CallbackRegistry {
    /// Handlers will run on `context`
    pub fn new(context: Arc<dyn CompletionContext>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            context,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<JobKey, CallbackEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store both handlers for `key`; a previous registration for the same key is replaced
    pub fn register(&self, key: JobKey, on_success: OnComplete, on_failure: OnFailure) {
        debug!("Registering callbacks for {}", key);
        let previous = self.entries().insert(key.clone(), CallbackEntry { on_success, on_failure });
        if previous.is_some() {
            warn!("Callbacks for {} were already registered and have been replaced", key);
        }
    }

    /// Schedule the success handler of `key`. Returns false if nothing was registered.
    pub fn dispatch_success(&self, key: &JobKey, output: PathBuf) -> bool {
        match self.take(key) {
            Some(entry) => {
                debug!("The success callback for {} is going to be run", key);
                let on_success = entry.on_success;
                self.context.execute(Box::new(move || on_success(output)));
                true
            }
            None => {
                debug!("No pending callbacks for {}, success ignored", key);
                false
            }
        }
    }

    /// Schedule the failure handler of `key`. Returns false if nothing was registered.
    pub fn dispatch_failure(&self, key: &JobKey, error: OptimizeError) -> bool {
        match self.take(key) {
            Some(entry) => {
                debug!("The failure callback for {} is going to be run", key);
                let on_failure = entry.on_failure;
                self.context.execute(Box::new(move || on_failure(error)));
                true
            }
            None => {
                debug!("No pending callbacks for {}, failure ignored: {}", key, error);
                false
            }
        }
    }

    fn take(&self, key: &JobKey) -> Option<CallbackEntry> {
        self.entries().remove(key)
    }
}
