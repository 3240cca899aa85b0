//! # Video Upload Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso della CLI `video-optimizer`.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (file JSON + override da CLI)
//! - Esecuzione del sottocomando richiesto
//!
//! ## Sottocomandi:
//! - `info <video>`: durata, bitrate e dimensioni
//! - `preview <video>`: estrae il primo frame come JPEG
//! - `optimize <video>`: ottimizza per l'upload (Ctrl-C annulla)
//! - `tools`: report sulla disponibilità di ffmpeg/ffprobe
//! - `save-config <file>`: salva la configurazione effettiva in JSON
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-optimizer optimize ~/Movies/holiday.mov --output-dir /tmp/out --verbose
//! video-optimizer --json info file:///sdcard/DCIM/clip.mp4
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_upload_optimizer::{
    file_manager::FileManager,
    json_output::JsonMessage,
    platform::PlatformCommands,
    progress::ProgressManager,
    utils::{base_name, remove_file_prefix},
    Config, OptimizeError, VideoOptimizer,
};

#[derive(Parser)]
#[command(name = "video-optimizer")]
#[command(about = "Shrink videos for fast upload: downscale, cap the bitrate, keep the audio")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (JSON); missing fields use defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for optimized videos and previews
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Emit JSON lines on stdout instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print duration, bitrate and frame size of a video
    Info { video: String },

    /// Extract the first frame of a video as JPEG
    Preview { video: String },

    /// Optimize a video for upload
    Optimize {
        video: String,

        /// Target video bitrate (bits/s)
        #[arg(short, long)]
        bitrate: Option<u32>,
    },

    /// Report availability of the external tools
    Tools,

    /// Write the effective configuration (file + flags) to a JSON file
    SaveConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so that --json keeps stdout clean
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(output_dir) = args.output_dir.clone() {
        config.output_dir = output_dir;
    }
    config.json_output = args.json;

    let result = match args.command {
        Command::Tools => {
            print_tools_report(config.json_output).await;
            Ok(())
        }
        Command::SaveConfig { path } => save_config(&config, &path).await,
        Command::Info { video } => run_info(config, &video).await,
        Command::Preview { video } => run_preview(config, &video).await,
        Command::Optimize { video, bitrate } => {
            if let Some(bitrate) = bitrate {
                config.video_bitrate = bitrate;
            }
            run_optimize(config, &video).await
        }
    };

    if let Err(e) = &result {
        if args.json {
            JsonMessage::error(e.to_string(), e.chain().nth(1).map(|s| s.to_string())).emit();
        }
    }
    result
}

async fn print_tools_report(json: bool) {
    let platform = PlatformCommands::instance();
    if json {
        let details = format!(
            "ffmpeg: {}, ffprobe: {}",
            platform.is_command_available("ffmpeg").await,
            platform.is_command_available("ffprobe").await
        );
        if platform.is_supported() {
            info!("{}", details);
        } else {
            JsonMessage::error("Video optimization is not supported on this platform".to_string(), Some(details))
                .emit();
        }
    } else {
        println!("{}", platform.get_tools_report());
    }
}

async fn save_config(config: &Config, path: &std::path::Path) -> Result<()> {
    config.validate()?;
    config.save_to_file(path).await?;
    info!("💾 Configuration saved to {}", path.display());
    Ok(())
}

fn ensure_input(video: &str) -> Result<PathBuf> {
    let path = remove_file_prefix(video);
    if !path.is_file() {
        return Err(anyhow::anyhow!("Video does not exist: {}", path.display()));
    }
    if !FileManager::is_video(&path) {
        warn!("{} doesn't have a known video extension, trying anyway", path.display());
    }
    Ok(path)
}

async fn run_info(config: Config, video: &str) -> Result<()> {
    let path = ensure_input(video)?;
    let json = config.json_output;
    let optimizer = VideoOptimizer::new(config)?;

    let spinner = (!json).then(|| ProgressManager::spinner("Reading metadata..."));
    let probe_target = video.to_string();
    let (duration, bitrate, size) = tokio::task::spawn_blocking(move || {
        (
            optimizer.get_video_duration(&probe_target),
            optimizer.get_video_bitrate(&probe_target),
            optimizer.get_video_size(&probe_target),
        )
    })
    .await?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        JsonMessage::metadata(path, duration, bitrate, size).emit();
        return Ok(());
    }

    let show = |value: i64, unit: &str| {
        if value < 0 {
            "unknown".to_string()
        } else {
            format!("{} {}", value, unit)
        }
    };
    println!("📹 {}", path.display());
    println!("   Duration: {}", show(duration, "s"));
    println!("   Bitrate:  {}", show(i64::from(bitrate), "bit/s"));
    match size {
        Some(size) => println!("   Size:     {}", size),
        None => println!("   Size:     unknown"),
    }
    Ok(())
}

async fn run_preview(config: Config, video: &str) -> Result<()> {
    let path = ensure_input(video)?;
    let json = config.json_output;
    let optimizer = VideoOptimizer::new(config)?;

    let target = video.to_string();
    let preview = tokio::task::spawn_blocking(move || optimizer.get_video_preview(&target)).await?;

    match preview {
        Some(preview) if json => JsonMessage::preview(preview).emit(),
        Some(preview) => println!("🖼️  Preview of {}: {}", path.display(), preview.display()),
        None => return Err(anyhow::anyhow!("Could not extract a preview from {}", path.display())),
    }
    Ok(())
}

async fn run_optimize(config: Config, video: &str) -> Result<()> {
    let input = ensure_input(video)?;
    let json = config.json_output;
    if json {
        JsonMessage::start(input.clone(), &config).emit();
    }

    let optimizer = VideoOptimizer::new(config)?;
    let original_size = FileManager::get_file_size(&input).await?;
    let started = Instant::now();

    let progress = if json {
        ProgressManager::hidden()
    } else {
        ProgressManager::new(&base_name(&input))
    };

    let (done_tx, mut done_rx) = oneshot::channel::<Result<PathBuf, OptimizeError>>();
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();

    // Exactly one of the two terminal callbacks runs; both resolve the same channel
    let terminal = Arc::new(Mutex::new(Some(done_tx)));
    let on_complete = {
        let terminal = terminal.clone();
        move |path: PathBuf| {
            if let Some(tx) = terminal.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(Ok(path));
            }
        }
    };
    let on_failure = move |error: OptimizeError| {
        if let Some(tx) = terminal.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(Err(error));
        }
    };
    let on_progress = move |percentage: u8| {
        let _ = progress_tx.send(percentage);
    };

    optimizer.optimize_video_for_upload(video, on_complete, on_failure, on_progress)?;

    let mut cancel_requested = false;
    let outcome = loop {
        tokio::select! {
            result = &mut done_rx => {
                break result.map_err(|_| anyhow::anyhow!("Optimization ended without reporting a result"))?;
            }
            Some(percentage) = progress_rx.recv() => {
                progress.set_percentage(percentage);
                if json {
                    JsonMessage::progress(percentage).emit();
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                warn!("Interrupted, cancelling the optimization...");
                cancel_requested = optimizer.cancel();
            }
        }
    };

    match outcome {
        Ok(output) => {
            let optimized_size = FileManager::get_file_size(&output).await?;
            let elapsed = started.elapsed().as_secs_f64();
            progress.finish("done");

            if json {
                JsonMessage::complete(input, output, original_size, optimized_size, elapsed).emit();
            } else {
                println!(
                    "✅ {} -> {} ({} -> {}, {:.1}% saved, {:.1}s)",
                    input.display(),
                    output.display(),
                    FileManager::format_size(original_size),
                    FileManager::format_size(optimized_size),
                    FileManager::calculate_reduction(original_size, optimized_size),
                    elapsed
                );
            }
            Ok(())
        }
        Err(error) => {
            progress.abandon(if error.is_cancellation() { "cancelled" } else { "failed" });
            Err(error.into())
        }
    }
}
