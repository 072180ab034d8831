//! Crate-wide configuration (§6 External Interfaces): everything a caller
//! can tune about connection, command, and process behavior, gathered in one
//! place the way the teacher's `BrowserConfig` does.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::supervisor::SupervisorConfig;

/// Top-level configuration for [`crate::browser::Browser::launch`] and
/// [`crate::browser::Browser::connect`].
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Path to the engine's executable. If unset, discovered the way
    /// [`crate::process::default_executable`] does.
    pub executable: Option<PathBuf>,
    /// Run headless. Defaults to `true`.
    pub headless: bool,
    /// Explicit remote-debugging port. `None` lets the engine pick one and
    /// discovers it from the process's stderr banner.
    pub port: Option<u16>,
    /// Extra command-line flags appended after the crate's baseline set.
    pub args: Vec<String>,
    /// Environment variables for the spawned process, merged over the
    /// current process's environment.
    pub process_envs: Option<HashMap<String, String>>,
    /// How long to wait for the process to print its debugging-port banner.
    pub launch_timeout: Duration,
    /// Transport-level connect timeout for the initial WebSocket handshake
    /// and every reconnect attempt.
    pub connect_timeout: Duration,
    /// Default timeout applied to a command when the caller doesn't specify
    /// one explicitly.
    pub default_command_timeout: Duration,
    /// Reconnect and heartbeat behavior (§4.4).
    pub supervisor: SupervisorConfig,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig {
            executable: None,
            headless: true,
            port: None,
            args: Vec::new(),
            process_envs: None,
            launch_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            default_command_timeout: Duration::from_secs(30),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl BrowserConfig {
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }
}

/// A small builder for the common overrides; everything else is reachable
/// by mutating the struct directly after `build()`.
#[derive(Debug, Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfigInner,
}

#[derive(Debug, Default)]
struct BrowserConfigInner {
    executable: Option<PathBuf>,
    headless: Option<bool>,
    port: Option<u16>,
    args: Vec<String>,
}

impl BrowserConfigBuilder {
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.executable = Some(path.into());
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = Some(headless);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    pub fn build(self) -> BrowserConfig {
        let mut config = BrowserConfig::default();
        if let Some(path) = self.config.executable {
            config.executable = Some(path);
        }
        if let Some(headless) = self.config.headless {
            config.headless = headless;
        }
        if let Some(port) = self.config.port {
            config.port = Some(port);
        }
        config.args = self.config.args;
        config
    }
}
