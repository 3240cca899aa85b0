//! # Tool Path Resolver
//!
//! Finds the external transcoding tools (ffmpeg, ffprobe) in the
//! environments the optimizer ships in:
//! - Directory pointed at by `TOOLS_DIR`
//! - Bundled next to the executable (`tools/<platform>/`)
//! - System `PATH`

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Tools the optimizer needs at runtime
pub const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Tool path resolver for different deployment environments
pub struct ToolPathResolver {
    /// Base directory where tools are bundled
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a new path resolver
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
        }
    }

    /// Create a resolver that looks in `tools_dir` before the system `PATH`
    pub fn with_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(tools_dir.into()),
        }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        // Strategy 1: explicit override
        if let Ok(tools_dir) = env::var("TOOLS_DIR") {
            let tools_path = PathBuf::from(tools_dir);
            debug!("Checking TOOLS_DIR environment variable: {:?}", tools_path);
            if tools_path.exists() {
                return Some(tools_path);
            }
        }

        // Strategy 2: bundled alongside the executable
        if let Ok(exe_path) = env::current_exe() {
            if let Some(app_dir) = exe_path.parent() {
                let possible_paths = [app_dir.join("tools"), app_dir.join("resources").join("tools")];

                for path in &possible_paths {
                    debug!("Checking bundled path: {:?}", path);
                    if path.exists() {
                        debug!("Found bundled tools directory: {:?}", path);
                        return Some(path.clone());
                    }
                }
            }
        }

        debug!("No bundled tools directory found, using system PATH only");
        None
    }

    /// Resolve the path to a specific tool, bundled first, then system `PATH`
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref tools_dir) = self.tools_dir {
            let bundled_path = Self::get_bundled_tool_path(tools_dir, tool_name);
            if bundled_path.exists() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled_path);
                return Some(bundled_path);
            }
        }

        if let Some(system_path) = Self::find_in_system_path(tool_name) {
            debug!("Using system tool: {} -> {:?}", tool_name, system_path);
            return Some(system_path);
        }

        warn!("Tool not found: {}", tool_name);
        None
    }

    /// Expected path of a bundled tool: `tools/{platform}/{tool}` or directly `tools/{tool}`
    fn get_bundled_tool_path(tools_dir: &Path, tool_name: &str) -> PathBuf {
        let platform = if cfg!(target_os = "macos") { "darwin" } else { env::consts::OS };
        let file_name = format!("{}{}", tool_name, env::consts::EXE_SUFFIX);

        let platform_path = tools_dir.join(platform).join(&file_name);
        if platform_path.exists() {
            return platform_path;
        }

        tools_dir.join(file_name)
    }

    fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        let tool_with_ext = format!("{}{}", tool_name, env::consts::EXE_SUFFIX);
        let paths = env::var_os("PATH")?;

        env::split_paths(&paths)
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// Human readable availability report for the required tools
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Tool Path Resolver Report\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n\n", self.tools_dir));

        for tool in REQUIRED_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {:?}\n", tool, path)),
                None => report.push_str(&format!("  ❌ {} (not found, install ffmpeg)\n", tool)),
            }
        }

        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}
