//! # Video Optimizer Orchestrator
//!
//! Orchestratore single-flight: accetta una sola ottimizzazione alla volta,
//! alloca il path di output, registra le callback, avvia i due timer e
//! delega la ricodifica all'encoder su un worker bloccante.
//!
//! ## Ciclo di vita di un job:
//! ```text
//! Idle --optimize()--> Running --engine ok------> Succeeded --> Idle
//!                              --engine ko------> Failed    --> Idle
//!                              --cancel()-------> Failed    --> Idle
//! ```
//! Una chiamata a `optimize_video_for_upload` mentre un job è `Running`
//! restituisce subito `OptimizeError::InvalidState` e non tocca il job in corso.
//!
//! ## Garanzie:
//! - Esattamente una callback terminale (successo o errore) per job accettato
//! - Progresso in [0, 99], mai decrescente, mai dopo la callback terminale
//! - Il path di output viene riservato atomicamente: mai sovrascritto né rimosso un file altrui
//! - Timer e driver girano sul runtime catturato alla costruzione, quindi
//!   `optimize_video_for_upload` si può chiamare anche da un thread qualsiasi
//! - In caso di errore, l'eventuale output parziale viene rimosso

use crate::config::Config;
use crate::engine::{EngineSession, FfmpegEngine, TranscodeEngine, TranscodeRequest};
use crate::error::OptimizeError;
use crate::metadata::{is_jpeg_file, FfprobeProbe, MediaProbe, VideoSize};
use crate::optimizer::callback_registry::{CallbackRegistry, JobKey};
use crate::optimizer::completion::{CompletionContext, SerialQueue};
use crate::optimizer::path_allocator::{Clock, PathAllocator};
use crate::optimizer::progress_tracker::ProgressTracker;
use crate::optimizer::timers::{self, OnProgress, TimerHandle};
use crate::utils::remove_file_prefix;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

const UNSUPPORTED: &str = "VideoOptimizer is not supported in the current platform";

/// Externally visible state of the optimizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running(JobKey),
}

enum JobState {
    Idle,
    Running { key: JobKey, session: Arc<EngineSession> },
}

/// Everything the background driver owns for one accepted job
struct JobContext {
    key: JobKey,
    input: PathBuf,
    output: PathBuf,
    session: Arc<EngineSession>,
}

/// Single-flight video optimizer
#[derive(Clone)]
pub struct VideoOptimizer {
    config: Config,
    engine: Arc<dyn TranscodeEngine>,
    probe: Arc<dyn MediaProbe>,
    completion: Arc<dyn CompletionContext>,
    registry: Arc<CallbackRegistry>,
    tracker: Arc<ProgressTracker>,
    allocator: PathAllocator,
    state: Arc<Mutex<JobState>>,
    runtime: Handle,
}

impl VideoOptimizer {
    /// ffmpeg-backed optimizer whose callbacks run on a serial queue.
    /// Must be called inside a tokio runtime; the runtime is kept for later jobs.
    pub fn new(config: Config) -> Result<Self, OptimizeError> {
        let runtime = current_runtime()?;
        let completion = SerialQueue::spawn(&runtime);
        Self::with_runtime(
            config,
            Arc::new(FfmpegEngine::new()),
            Arc::new(FfprobeProbe::new()),
            completion,
            runtime,
        )
    }

    /// Custom engine, probe and completion context on the current tokio runtime
    pub fn with_components(
        config: Config,
        engine: Arc<dyn TranscodeEngine>,
        probe: Arc<dyn MediaProbe>,
        completion: Arc<dyn CompletionContext>,
    ) -> Result<Self, OptimizeError> {
        Self::with_runtime(config, engine, probe, completion, current_runtime()?)
    }

    pub fn with_runtime(
        config: Config,
        engine: Arc<dyn TranscodeEngine>,
        probe: Arc<dyn MediaProbe>,
        completion: Arc<dyn CompletionContext>,
        runtime: Handle,
    ) -> Result<Self, OptimizeError> {
        config
            .validate()
            .map_err(|e| OptimizeError::Validation(e.to_string()))?;
        std::fs::create_dir_all(&config.output_dir)?;

        Ok(Self {
            allocator: PathAllocator::new(&config.output_dir),
            registry: Arc::new(CallbackRegistry::new(completion.clone())),
            tracker: Arc::new(ProgressTracker::new()),
            state: Arc::new(Mutex::new(JobState::Idle)),
            config,
            engine,
            probe,
            completion,
            runtime,
        })
    }

    /// Replace the clock used to name output files
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.allocator = PathAllocator::with_clock(&self.config.output_dir, clock);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Capability probe: both the engine and the metadata probe can run here
    pub fn is_supported(&self) -> bool {
        self.engine.is_supported() && self.probe.is_supported()
    }

    /// Duration in seconds, or -1 in case of error
    pub fn get_video_duration(&self, video: &str) -> i64 {
        if !self.probe.is_supported() {
            error!("{}", UNSUPPORTED);
            return -1;
        }
        self.probe
            .duration(&remove_file_prefix(video))
            .and_then(|secs| i64::try_from(secs).ok())
            .unwrap_or(-1)
    }

    /// Average bitrate in bits/s, or -1 in case of error
    pub fn get_video_bitrate(&self, video: &str) -> i32 {
        if !self.probe.is_supported() {
            error!("{}", UNSUPPORTED);
            return -1;
        }
        self.probe
            .bitrate(&remove_file_prefix(video))
            .and_then(|bps| i32::try_from(bps).ok())
            .unwrap_or(-1)
    }

    /// Frame size, or `None` in case of error
    pub fn get_video_size(&self, video: &str) -> Option<VideoSize> {
        if !self.probe.is_supported() {
            error!("{}", UNSUPPORTED);
            return None;
        }
        let size = self.probe.size(&remove_file_prefix(video));
        if size.is_none() {
            error!("VideoOptimizer.get_video_size returned an invalid size for {}", video);
        }
        size
    }

    /// JPEG of the first frame, written to a fresh path in the output
    /// directory; `None` if extraction fails or the result isn't a JPEG
    pub fn get_video_preview(&self, video: &str) -> Option<PathBuf> {
        if !self.probe.is_supported() {
            error!("{}", UNSUPPORTED);
            return None;
        }

        let input = remove_file_prefix(video);
        let output = match self.allocator.allocate(Some("jpg")) {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot allocate a preview path: {}", e);
                return None;
            }
        };

        if let Err(e) = self
            .probe
            .extract_preview(&input, &output, self.config.preview_quality)
        {
            error!("Preview extraction failed for {}: {}", input.display(), e);
            let _ = std::fs::remove_file(&output);
            return None;
        }

        if is_jpeg_file(&output) {
            Some(output)
        } else {
            error!("The preview produced for {} is not a valid jpeg", input.display());
            let _ = std::fs::remove_file(&output);
            None
        }
    }

    /// Last published percentage of the running (or last) job
    pub fn progress(&self) -> u8 {
        self.tracker.get()
    }

    pub fn status(&self) -> JobStatus {
        match &*self.lock_state() {
            JobState::Idle => JobStatus::Idle,
            JobState::Running { key, .. } => JobStatus::Running(key.clone()),
        }
    }

    /// Ask the running engine to stop; the job then fails with
    /// `EngineCancelled`. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        match &*self.lock_state() {
            JobState::Running { key, session } => {
                info!("Cancelling optimization of {}", key);
                session.cancel();
                true
            }
            JobState::Idle => false,
        }
    }

    /// Start optimizing `video` for upload, in the background.
    ///
    /// Produces a new mp4 in the output directory: shorter side divided by
    /// an integer factor towards `max_short_side`, video bitrate capped at
    /// `video_bitrate`, audio copied. `on_progress` fires every
    /// `progress_interval` with a value in [0, 99]; then exactly one of
    /// `on_complete` / `on_failure` fires. All three run on the completion
    /// context.
    ///
    /// Fails immediately with `InvalidState` while another optimization is running.
    pub fn optimize_video_for_upload<C, F, P>(
        &self,
        video: &str,
        on_complete: C,
        on_failure: F,
        on_progress: P,
    ) -> Result<JobKey, OptimizeError>
    where
        C: FnOnce(PathBuf) + Send + 'static,
        F: FnOnce(OptimizeError) + Send + 'static,
        P: Fn(u8) + Send + Sync + 'static,
    {
        let input = remove_file_prefix(video);
        let key = JobKey::from_path(&input);
        let session = Arc::new(EngineSession::new());
        let supported = self.is_supported();

        {
            let mut state = self.lock_state();
            if let JobState::Running { key: running, .. } = &*state {
                warn!("Optimization of {} rejected: {} is still running", key, running);
                return Err(OptimizeError::InvalidState);
            }

            if supported {
                *state = JobState::Running {
                    key: key.clone(),
                    session: session.clone(),
                };
            }
        }

        if !supported {
            error!("{}", UNSUPPORTED);
            self.completion
                .execute(Box::new(move || on_failure(OptimizeError::UnsupportedPlatform)));
            return Ok(key);
        }

        self.tracker.reset();
        let output = match self.allocator.allocate(Some("mp4")) {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot allocate an output path in {}: {}", self.config.output_dir.display(), e);
                finish_job(&self.state);
                return Err(e.into());
            }
        };
        info!("🎬 Optimizing {} -> {}", input.display(), output.display());

        let success_state = self.state.clone();
        let failure_state = self.state.clone();
        self.registry.register(
            key.clone(),
            Box::new(move |path| {
                finish_job(&success_state);
                on_complete(path);
            }),
            Box::new(move |error| {
                finish_job(&failure_state);
                on_failure(error);
            }),
        );

        let on_progress: OnProgress = Arc::new(on_progress);
        let poller = timers::spawn_progress_poller(
            &self.runtime,
            self.tracker.clone(),
            on_progress,
            self.completion.clone(),
            self.config.progress_interval(),
        );

        let job = JobContext {
            key: key.clone(),
            input,
            output,
            session,
        };
        let this = self.clone();
        self.runtime.spawn(async move { this.drive(job, poller).await });

        Ok(key)
    }

    /// Background half of a job: transcode, stop the timers, dispatch exactly once
    async fn drive(self, job: JobContext, poller: TimerHandle) {
        let result = self.transcode(&job).await;
        poller.stop().await;

        let dispatched = match result {
            Ok(()) => {
                info!("✅ Exporting of {} completed: {}", job.key, job.output.display());
                self.registry.dispatch_success(&job.key, job.output.clone())
            }
            Err(error) => {
                warn!("❌ Exporting of {} failed: {}", job.key, error);
                self.discard_output(&job).await;
                self.registry.dispatch_failure(&job.key, error)
            }
        };

        if !dispatched {
            warn!("Callbacks for {} vanished before dispatch", job.key);
            finish_job(&self.state);
        }
    }

    async fn transcode(&self, job: &JobContext) -> Result<(), OptimizeError> {
        let probe = self.probe.clone();
        let input = job.input.clone();
        let (size, duration) = tokio::task::spawn_blocking(move || (probe.size(&input), probe.duration(&input)))
            .await
            .map_err(worker_failure)?;

        let size = size.ok_or_else(|| {
            OptimizeError::MetadataUnavailable(format!("cannot read the frame size of {}", job.input.display()))
        })?;
        if duration.map_or(true, |secs| secs == 0) {
            warn!("Duration of {} unavailable, progress will stay at 0", job.input.display());
        }

        let request = TranscodeRequest {
            input: job.input.clone(),
            output: job.output.clone(),
            scale_factor: size.scale_factor(self.config.max_short_side),
            video_bitrate: self.config.video_bitrate,
            video_codec: self.config.video_codec.clone(),
        };
        debug!(
            "Source {} ({:?} s), scale factor {} -> {}",
            size,
            duration,
            request.scale_factor,
            size.scaled(request.scale_factor)
        );

        if job.session.is_cancelled() {
            return Err(OptimizeError::EngineCancelled);
        }

        let sampler = timers::spawn_statistics_sampler(
            &self.runtime,
            self.tracker.clone(),
            job.session.clone(),
            duration,
            self.config.sampler_delay(),
            self.config.sampler_interval(),
        );

        let engine = self.engine.clone();
        let session = job.session.clone();
        let started = std::time::Instant::now();
        let outcome = tokio::task::spawn_blocking(move || engine.execute(&request, &session)).await;
        sampler.stop().await;

        let outcome = outcome.map_err(worker_failure)?;
        debug!(
            "Engine finished in {:.1}s with {:?}: {}",
            started.elapsed().as_secs_f64(),
            outcome.return_code,
            outcome.output
        );
        outcome.into_result()?;

        let written = tokio::fs::metadata(&job.output)
            .await
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(OptimizeError::EngineFailure {
                code: 0,
                output: format!("engine reported success but {} was not written", job.output.display()),
            });
        }

        Ok(())
    }

    async fn discard_output(&self, job: &JobContext) {
        if job.output.exists() {
            match tokio::fs::remove_file(&job.output).await {
                Ok(()) => debug!("Removed partial output {}", job.output.display()),
                Err(e) => warn!("Failed to remove partial output {}: {}", job.output.display(), e),
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn current_runtime() -> Result<Handle, OptimizeError> {
    Handle::try_current().map_err(|e| OptimizeError::RuntimeUnavailable(e.to_string()))
}

fn finish_job(state: &Mutex<JobState>) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = JobState::Idle;
}

fn worker_failure(e: tokio::task::JoinError) -> OptimizeError {
    OptimizeError::EngineFailure {
        code: -1,
        output: format!("optimization worker stopped abnormally: {}", e),
    }
}
