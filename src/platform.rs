//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per i tool esterni
//! (ffmpeg, ffprobe) e fornisce il controllo di capacità usato per decidere
//! se l'ottimizzazione video è supportata sulla piattaforma corrente.

use crate::tool_resolver::{ToolPathResolver, REQUIRED_TOOLS};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Platform-specific command manager with tool resolution
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
    tool_resolver: ToolPathResolver,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        let which_command = if cfg!(windows) {
            commands.insert("ffmpeg", "ffmpeg.exe");
            commands.insert("ffprobe", "ffprobe.exe");
            "where"
        } else {
            commands.insert("ffmpeg", "ffmpeg");
            commands.insert("ffprobe", "ffprobe");
            "which"
        };

        Self {
            commands,
            which_command,
            tool_resolver: ToolPathResolver::new(),
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Resolved program to execute: bundled/system path if found, bare command name otherwise
    pub fn program(&self, base_name: &str) -> PathBuf {
        self.tool_resolver
            .resolve_tool(base_name)
            .unwrap_or_else(|| PathBuf::from(self.get_command(base_name)))
    }

    /// Synchronous capability probe: every required tool resolves
    pub fn is_supported(&self) -> bool {
        REQUIRED_TOOLS.iter().all(|tool| self.tool_resolver.is_tool_available(tool))
    }

    /// Check if a command is available on the system or bundled
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        if self.tool_resolver.is_tool_available(base_name) {
            return true;
        }

        // Fallback to traditional which/where command
        let result = tokio::process::Command::new(self.which_command)
            .arg(self.get_command(base_name))
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Get a report of all required tools
    pub fn get_tools_report(&self) -> String {
        format!("{}\nSystem: {}\n", self.tool_resolver.get_tools_report(), Self::system_info())
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
