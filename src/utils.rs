//! # Utility Functions Module
//!
//! Small helpers shared by the engine, the probe and the orchestrator:
//! building ffmpeg argument lists and normalizing the paths callers hand us.

use std::path::{Path, PathBuf};

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust,ignore
/// let bitrate = 750_000;
/// let args = to_string_vec(["-b:v", &bitrate.to_string(), "-c:a", "copy"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Macro for building command line argument vectors from mixed types.
///
/// # Example
/// ```rust,ignore
/// let args = args!["-b:v", 750_000, "-c:a", "copy"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Removes a leading `file:` scheme (and any extra leading slashes after it).
///
/// `file:///tmp/a.mp4` and `file:/tmp/a.mp4` both become `/tmp/a.mp4`;
/// paths without the prefix are returned unchanged.
pub fn remove_file_prefix(path: &str) -> PathBuf {
    match path.strip_prefix("file:") {
        Some(rest) => {
            let trimmed = rest.trim_start_matches('/');
            if rest.starts_with('/') {
                PathBuf::from(format!("/{}", trimmed))
            } else {
                PathBuf::from(trimmed)
            }
        }
        None => PathBuf::from(path),
    }
}

/// File name with extension, path stripped. Falls back to the whole path
/// when there is no final component (e.g. `..`).
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_vec_mixed_types() {
        let num = 42;
        let result = to_string_vec(["-b:v", &num.to_string(), "-an"]);
        assert_eq!(result, vec!["-b:v".to_string(), "42".to_string(), "-an".to_string()]);
    }

    #[test]
    fn test_args_macro() {
        let factor = 3;
        let result = args!["-vf", format!("scale=iw/{}:ih/{}", factor, factor), "-b:v", 750_000];
        assert_eq!(result, vec!["-vf", "scale=iw/3:ih/3", "-b:v", "750000"]);
    }

    #[test]
    fn test_remove_file_prefix() {
        assert_eq!(remove_file_prefix("file:///tmp/video.mp4"), PathBuf::from("/tmp/video.mp4"));
        assert_eq!(remove_file_prefix("file://tmp/video.mp4"), PathBuf::from("/tmp/video.mp4"));
        assert_eq!(remove_file_prefix("file:/tmp/video.mp4"), PathBuf::from("/tmp/video.mp4"));
        assert_eq!(remove_file_prefix("/tmp/video.mp4"), PathBuf::from("/tmp/video.mp4"));
        assert_eq!(remove_file_prefix("relative/video.mov"), PathBuf::from("relative/video.mov"));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/storage/DCIM/clip.mov")), "clip.mov");
        assert_eq!(base_name(Path::new("clip.mov")), "clip.mov");
    }
}
