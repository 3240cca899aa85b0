//! # Path Allocation Module
//!
//! Genera path di output mai usati: `<output_dir>/<timestamp ms>.<ext>`.
//! Il file viene creato vuoto in modo atomico (`create_new`), così il path
//! appartiene al chiamante: se esiste già, il timestamp viene incrementato
//! finché non se ne trova uno libero. Un timestamp già assegnato non viene
//! mai riassegnato.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Source of wall-clock milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// `Clock` reading the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Collision-free, timestamp-based output paths under one directory
#[derive(Clone)]
pub struct PathAllocator {
    base_dir: PathBuf,
    clock: Arc<dyn Clock>,
    last_issued: Arc<Mutex<Option<u64>>>,
}

impl PathAllocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(base_dir, Arc::new(SystemClock))
    }

    pub fn with_clock(base_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_dir: base_dir.into(),
            clock,
            last_issued: Arc::new(Mutex::new(None)),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Claim a fresh path by creating it as an empty file. A leading "." is
    /// added to the extension if missing; `None` produces a path without extension.
    pub fn allocate(&self, extension: Option<&str>) -> io::Result<PathBuf> {
        let suffix = match extension {
            Some(ext) if ext.starts_with('.') => ext.to_string(),
            Some(ext) => format!(".{}", ext),
            None => String::new(),
        };

        let mut last_issued = self.last_issued.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stamp = self.clock.now_millis();
        if let Some(last) = *last_issued {
            stamp = stamp.max(last + 1);
        }

        loop {
            let candidate = self.candidate(stamp, &suffix);
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(_) => {
                    *last_issued = Some(stamp);
                    debug!("Allocated output path: {}", candidate.display());
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e),
            }
        }
    }

    fn candidate(&self, stamp: u64, suffix: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", stamp, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_allocate_uses_timestamp_and_extension() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = PathAllocator::with_clock(temp_dir.path(), Arc::new(FixedClock(1_700_000_000_000)));

        assert_eq!(
            allocator.allocate(Some("mp4")).unwrap(),
            temp_dir.path().join("1700000000000.mp4")
        );
        assert_eq!(
            allocator.allocate(Some(".jpg")).unwrap(),
            temp_dir.path().join("1700000000001.jpg")
        );
        assert_eq!(allocator.allocate(None).unwrap(), temp_dir.path().join("1700000000002"));
    }

    #[test]
    fn test_existing_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("5000.mp4"), b"taken").unwrap();
        std::fs::write(temp_dir.path().join("5001.mp4"), b"taken").unwrap();

        let allocator = PathAllocator::with_clock(temp_dir.path(), Arc::new(FixedClock(5000)));
        let path = allocator.allocate(Some("mp4")).unwrap();

        assert_eq!(path, temp_dir.path().join("5002.mp4"));
        assert_eq!(std::fs::read(temp_dir.path().join("5000.mp4")).unwrap(), b"taken");
    }

    #[test]
    fn test_allocated_path_is_claimed() {
        let temp_dir = TempDir::new().unwrap();
        let path = PathAllocator::with_clock(temp_dir.path(), Arc::new(FixedClock(7)))
            .allocate(Some("mp4"))
            .unwrap();
        assert!(path.is_file());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        // A second allocator on the same directory (another process) can't get it
        let other = PathAllocator::with_clock(temp_dir.path(), Arc::new(FixedClock(7)))
            .allocate(Some("mp4"))
            .unwrap();
        assert_ne!(path, other);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = PathAllocator::new(temp_dir.path().join("gone"));
        assert!(allocator.allocate(Some("mp4")).is_err());
    }

    #[test]
    fn test_constant_clock_still_yields_distinct_paths() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = PathAllocator::with_clock(temp_dir.path(), Arc::new(FixedClock(42)));

        let first = allocator.allocate(Some("mp4")).unwrap();
        let second = allocator.allocate(Some("mp4")).unwrap();
        let third = allocator.clone().allocate(Some("mp4")).unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[test]
    fn test_system_clock_paths_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = PathAllocator::new(temp_dir.path());

        let paths: std::collections::HashSet<_> = (0..20)
            .map(|_| allocator.allocate(Some("mp4")).unwrap())
            .collect();
        assert_eq!(paths.len(), 20);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 20);
    }
}
