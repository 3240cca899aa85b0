//! # Completion Context Module
//!
//! Contesto di esecuzione delle callback del chiamante.
//! Il lavoro pesante gira su un worker bloccante, ma le notifiche
//! (progresso, completamento, errore) vengono rimesse in coda qui, così il
//! codice del chiamante gira sempre nello stesso contesto seriale.
//!
//! Una callback che va in panic viene isolata solo quando il crate è
//! compilato con `panic = "unwind"`: col profilo release (`panic = "abort"`)
//! il processo termina.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Unit of work handed to a completion context
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where caller-facing callbacks are executed
pub trait CompletionContext: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs tasks one at a time, in submission order, on a dedicated tokio task
pub struct SerialQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl SerialQueue {
    /// Start the draining task on `runtime`
    pub fn spawn(runtime: &Handle) -> Arc<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        runtime.spawn(async move {
            while let Some(task) = receiver.recv().await {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("A completion callback panicked");
                }
            }
        });

        Arc::new(Self { sender })
    }
}

impl CompletionContext for SerialQueue {
    fn execute(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("Completion queue is closed, dropping callback");
        }
    }
}

/// Runs tasks immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl CompletionContext for InlineContext {
    fn execute(&self, task: Task) {
        task();
    }
}
