//! # Video Metadata Module
//!
//! Synchronous wrappers around ffprobe/ffmpeg used to inspect a source video:
//! duration, average bitrate, frame size and a JPEG preview of the first frame.
//!
//! Every call is a plain blocking probe. Failures never propagate: they are
//! logged and surface as `None`, so a corrupt file can't take the caller down.

use crate::error::OptimizeError;
use crate::platform::PlatformCommands;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Width and height of a video stream, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }

    /// Integer downscale factor bringing the shorter side towards `max_short_side`.
    ///
    /// `floor(min(width, height) / max_short_side)`, never less than 1.
    pub fn scale_factor(&self, max_short_side: u32) -> u32 {
        (self.shorter_side() / max_short_side.max(1)).max(1)
    }

    /// Size produced by `scale=iw/f:ih/f`
    pub fn scaled(&self, factor: u32) -> VideoSize {
        let factor = factor.max(1);
        VideoSize::new(self.width / factor, self.height / factor)
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses the `WIDTHxHEIGHT` form printed by ffprobe (`1280x720`)
impl FromStr for VideoSize {
    type Err = OptimizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OptimizeError::MetadataUnavailable(format!("invalid video size: {:?}", s));

        let mut tokens = s.trim().split('x');
        let (width, height) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(w), Some(h), None) => (w, h),
            _ => return Err(invalid()),
        };

        let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(VideoSize::new(width, height))
    }
}

/// Source of video metadata. Implementations block the calling thread.
pub trait MediaProbe: Send + Sync {
    /// Whether the probe can run on this platform at all
    fn is_supported(&self) -> bool;

    /// Duration in whole seconds
    fn duration(&self, video: &Path) -> Option<u64>;

    /// Average bitrate in bits/s
    fn bitrate(&self, video: &Path) -> Option<u32>;

    fn size(&self, video: &Path) -> Option<VideoSize>;

    /// Write the frame at t=0 as a JPEG of the given quality to `jpeg_path`
    fn extract_preview(&self, video: &Path, jpeg_path: &Path, quality: u8) -> Result<(), OptimizeError>;
}

/// `MediaProbe` backed by the ffprobe and ffmpeg binaries
#[derive(Debug, Default, Clone)]
pub struct FfprobeProbe;

impl FfprobeProbe {
    pub fn new() -> Self {
        Self
    }

    /// Run ffprobe for a single entry and return its trimmed stdout
    fn probe_entry(&self, video: &Path, select_stream: Option<&str>, entry: &str) -> Option<String> {
        let platform = PlatformCommands::instance();
        let mut cmd = Command::new(platform.program("ffprobe"));
        cmd.args(["-v", "error"]);
        if let Some(stream) = select_stream {
            cmd.args(["-select_streams", stream]);
        }
        cmd.args(["-show_entries", entry, "-of", "csv=s=x:p=0"]).arg(video);

        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to execute ffprobe: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                "ffprobe failed on {}: {}",
                video.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let value = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && line != "N/A");

        debug!("ffprobe {} on {} -> {:?}", entry, video.display(), value);
        value
    }
}

impl MediaProbe for FfprobeProbe {
    fn is_supported(&self) -> bool {
        PlatformCommands::instance().is_supported()
    }

    fn duration(&self, video: &Path) -> Option<u64> {
        self.probe_entry(video, None, "format=duration")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs.trunc() as u64)
    }

    fn bitrate(&self, video: &Path) -> Option<u32> {
        self.probe_entry(video, None, "format=bit_rate")
            .and_then(|value| value.parse::<u32>().ok())
    }

    fn size(&self, video: &Path) -> Option<VideoSize> {
        let value = self.probe_entry(video, Some("v:0"), "stream=width,height")?;
        match value.parse::<VideoSize>() {
            Ok(size) => Some(size),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn extract_preview(&self, video: &Path, jpeg_path: &Path, quality: u8) -> Result<(), OptimizeError> {
        // ffmpeg grabs the frame losslessly, the JPEG encoding (and its quality) is ours
        let frame_file = NamedTempFile::with_suffix(".png")?;

        let platform = PlatformCommands::instance();
        let output = Command::new(platform.program("ffmpeg"))
            .args(["-v", "error", "-nostdin", "-y", "-ss", "0", "-i"])
            .arg(video)
            .args(["-frames:v", "1", "-f", "image2", "-c:v", "png"])
            .arg(frame_file.path())
            .output()?;

        if !output.status.success() {
            return Err(OptimizeError::EngineFailure {
                code: output.status.code().unwrap_or(-1),
                output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let frame = image::open(frame_file.path())?.to_rgb8();
        let mut writer = std::io::BufWriter::new(std::fs::File::create(jpeg_path)?);
        JpegEncoder::new_with_quality(&mut writer, quality).encode(
            frame.as_raw(),
            frame.width(),
            frame.height(),
            ColorType::Rgb8,
        )?;
        writer.flush()?;

        Ok(())
    }
}

/// True if the file exists and its content sniffs as JPEG
pub fn is_jpeg_file(path: &Path) -> bool {
    let mut header = [0u8; 16];
    let read = std::fs::File::open(path).and_then(|mut file| {
        use std::io::Read;
        file.read(&mut header)
    });

    match read {
        Ok(n) => matches!(image::guess_format(&header[..n]), Ok(ImageFormat::Jpeg)),
        Err(_) => false,
    }
}
