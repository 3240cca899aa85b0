//! # Transcoding Engine Module
//!
//! The engine is the opaque, blocking part of an optimization: it re-encodes
//! one video and only returns when the work is over, with a process-style
//! return code and free-text output.
//!
//! ## Pieces:
//! - `TranscodeRequest`: what to encode (input, output, scale, bitrate, codec)
//! - `EngineSession`: shared with the caller while the engine runs; the engine
//!   writes its statistics (elapsed encode time, frames) into it and watches
//!   it for cancellation requests
//! - `TranscodeEngine`: the trait the orchestrator drives
//! - `FfmpegEngine`: the ffmpeg implementation, reading `-progress pipe:1`
//!
//! ## Comando ffmpeg:
//! ```text
//! ffmpeg -hide_banner -nostdin -y -i <input> -vcodec mpeg4 -b:v 750000 \
//!        -vf scale=iw/<f>:ih/<f> -c:a copy -progress pipe:1 -nostats <output>
//! ```
//! The output path is claimed as an empty file before the engine runs, so
//! `-y` only ever overwrites the job's own placeholder.

use crate::args;
use crate::error::OptimizeError;
use crate::platform::PlatformCommands;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);
const OUTPUT_TAIL_LINES: usize = 20;

/// Terminal status reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    Cancelled,
    Failed(i32),
}

/// What the engine hands back once it stops
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    pub return_code: ReturnCode,
    /// Free-text engine output (tail of ffmpeg's stderr)
    pub output: String,
}

impl EngineOutcome {
    pub fn success() -> Self {
        Self {
            return_code: ReturnCode::Success,
            output: String::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            return_code: ReturnCode::Cancelled,
            output: String::new(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            return_code: ReturnCode::Failed(code),
            output: output.into(),
        }
    }

    pub fn into_result(self) -> Result<(), OptimizeError> {
        match self.return_code {
            ReturnCode::Success => Ok(()),
            ReturnCode::Cancelled => Err(OptimizeError::EngineCancelled),
            ReturnCode::Failed(code) => Err(OptimizeError::EngineFailure {
                code,
                output: self.output,
            }),
        }
    }
}

/// Live statistics and cancellation flag of one engine run
#[derive(Debug)]
pub struct EngineSession {
    time_ms: AtomicI64,
    frame: AtomicU64,
    cancel_requested: AtomicBool,
}

impl EngineSession {
    pub fn new() -> Self {
        Self {
            time_ms: AtomicI64::new(0),
            frame: AtomicU64::new(0),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Encoded media time so far, in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        self.time_ms.load(Ordering::Acquire)
    }

    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Acquire)
    }

    pub fn record_time(&self, time_ms: i64) {
        self.time_ms.store(time_ms, Ordering::Release);
    }

    pub fn record_frame(&self, frame: u64) {
        self.frame.store(frame, Ordering::Release);
    }

    /// Ask the engine to abort its blocking call
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

/// A single re-encode job as the engine sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub scale_factor: u32,
    pub video_bitrate: u32,
    pub video_codec: String,
}

impl TranscodeRequest {
    /// ffmpeg arguments: scaled, bitrate-capped video, audio copied unmodified
    pub fn ffmpeg_args(&self) -> Vec<String> {
        args![
            "-hide_banner",
            "-nostdin",
            "-y",
            "-i",
            self.input.display(),
            "-vcodec",
            self.video_codec,
            "-b:v",
            self.video_bitrate,
            "-vf",
            format!("scale=iw/{}:ih/{}", self.scale_factor, self.scale_factor),
            "-c:a",
            "copy",
            "-progress",
            "pipe:1",
            "-nostats",
            self.output.display(),
        ]
    }
}

/// External transcoding engine. `execute` blocks until the encode is over.
pub trait TranscodeEngine: Send + Sync {
    fn is_supported(&self) -> bool;

    fn execute(&self, request: &TranscodeRequest, session: &EngineSession) -> EngineOutcome;
}

/// One parsed line of ffmpeg's `-progress` output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLine {
    /// Encoded time, milliseconds
    Time(i64),
    Frame(u64),
    End,
}

/// Parse a `key=value` progress line. `out_time_ms` is in microseconds
/// despite its name, exactly like `out_time_us`.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<i64>().ok().map(|us| ProgressLine::Time(us / 1000)),
        "frame" => value.parse::<u64>().ok().map(ProgressLine::Frame),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// `TranscodeEngine` that runs the ffmpeg binary
#[derive(Debug, Default, Clone)]
pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> Self {
        Self
    }

    fn wait_for_exit(
        child: &mut std::process::Child,
        session: &EngineSession,
    ) -> std::io::Result<ExitStatus> {
        let mut kill_sent = false;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if session.is_cancelled() && !kill_sent {
                debug!("Cancellation requested, killing ffmpeg (pid {})", child.id());
                if let Err(e) = child.kill() {
                    warn!("Failed to kill ffmpeg: {}", e);
                }
                kill_sent = true;
            }
            std::thread::sleep(CANCEL_POLL_INTERVAL);
        }
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn is_supported(&self) -> bool {
        PlatformCommands::instance().is_supported()
    }

    fn execute(&self, request: &TranscodeRequest, session: &EngineSession) -> EngineOutcome {
        let program = PlatformCommands::instance().program("ffmpeg");
        let args = request.ffmpeg_args();
        debug!("Running {} {}", program.display(), args.join(" "));

        let mut child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return EngineOutcome::failed(-1, format!("Failed to execute {}: {}", program.display(), e)),
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stderr_text) = std::thread::scope(|scope| {
            if let Some(stdout) = stdout {
                scope.spawn(move || {
                    for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                        match parse_progress_line(&line) {
                            Some(ProgressLine::Time(ms)) if ms >= 0 => session.record_time(ms),
                            Some(ProgressLine::Frame(frame)) => session.record_frame(frame),
                            Some(ProgressLine::End) => {
                                debug!("ffmpeg finished encoding after {} frames", session.frame())
                            }
                            _ => {}
                        }
                    }
                });
            }

            let stderr_reader = scope.spawn(move || {
                let mut text = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut text);
                }
                text
            });

            let status = Self::wait_for_exit(&mut child, session);
            let text = stderr_reader.join().unwrap_or_default();
            (status, text)
        });

        let output = tail_lines(&stderr_text, OUTPUT_TAIL_LINES);
        match status {
            Ok(status) if status.success() => EngineOutcome {
                return_code: ReturnCode::Success,
                output,
            },
            Ok(_) if session.is_cancelled() => EngineOutcome {
                return_code: ReturnCode::Cancelled,
                output,
            },
            Ok(status) => EngineOutcome::failed(status.code().unwrap_or(-1), output),
            Err(e) => {
                warn!("Lost track of ffmpeg process: {}", e);
                EngineOutcome::failed(-1, e.to_string())
            }
        }
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TranscodeRequest {
        TranscodeRequest {
            input: PathBuf::from("/videos/in.mov"),
            output: PathBuf::from("/out/1700000000000.mp4"),
            scale_factor: 3,
            video_bitrate: 750_000,
            video_codec: "mpeg4".to_string(),
        }
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = request().ffmpeg_args();
        let joined = args.join(" ");

        assert!(joined.contains("-i /videos/in.mov"));
        assert!(joined.contains("-vcodec mpeg4"));
        assert!(joined.contains("-b:v 750000"));
        assert!(joined.contains("-vf scale=iw/3:ih/3"));
        assert!(joined.contains("-c:a copy"));
        assert!(joined.contains("-progress pipe:1"));
        assert!(args.contains(&"-y".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/1700000000000.mp4"));
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("out_time_us=15000000"), Some(ProgressLine::Time(15_000)));
        assert_eq!(parse_progress_line("out_time_ms=2500000"), Some(ProgressLine::Time(2_500)));
        assert_eq!(parse_progress_line("frame=240\n"), Some(ProgressLine::Frame(240)));
        assert_eq!(parse_progress_line("progress=end"), Some(ProgressLine::End));
        assert_eq!(parse_progress_line("progress=continue"), None);
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("bitrate=742.1kbits/s"), None);
        assert_eq!(parse_progress_line("garbage"), None);
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(EngineOutcome::success().into_result().is_ok());
        assert!(matches!(
            EngineOutcome::cancelled().into_result(),
            Err(OptimizeError::EngineCancelled)
        ));
        match EngineOutcome::failed(1, "Invalid data found").into_result() {
            Err(OptimizeError::EngineFailure { code, output }) => {
                assert_eq!(code, 1);
                assert_eq!(output, "Invalid data found");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_session_statistics() {
        let session = EngineSession::new();
        assert_eq!(session.elapsed_ms(), 0);
        assert!(!session.is_cancelled());

        session.record_time(12_345);
        session.record_frame(300);
        session.cancel();

        assert_eq!(session.elapsed_ms(), 12_345);
        assert_eq!(session.frame(), 300);
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail_lines("a", 5), "a");
        assert_eq!(tail_lines("", 5), "");
    }
}
