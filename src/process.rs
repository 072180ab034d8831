//! Engine process discovery and launch.
//!
//! Deliberately thin (§1 Non-goals exclude "spawning the engine process,
//! parsing CLI flags, and locating the HTTP discovery endpoint" from the
//! core's scope) but present, since a real client library still needs a way
//! to get from zero to a debugging port. Grounded in the teacher's
//! `default_executable` search order.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::BrowserConfig;
use crate::error::{Error, Result, TransportError};

const CANDIDATE_BINARIES: &[&str] =
    &["google-chrome-stable", "chromium", "chromium-browser", "chrome", "chrome-browser"];

/// Locates a usable engine executable: the `CHROME` environment variable
/// first, then a handful of common binary names on `PATH`, then a couple of
/// well-known platform install locations.
pub fn default_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROME") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    for name in CANDIDATE_BINARIES {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let p = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if p.exists() {
            return Ok(p);
        }
    }

    Err(Error::Internal("could not locate an engine executable; set CHROME or BrowserConfig::executable".into()))
}

/// A still-running launched process plus the debugging port it reported.
pub struct LaunchedProcess {
    pub child: Child,
    pub port: u16,
}

impl Drop for LaunchedProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawns the engine with a baseline flag set plus `config.args`, and parses
/// its debugging port off the stderr banner (`DevTools listening on
/// ws://127.0.0.1:PORT/...`), the convention used by every Chromium-derived
/// engine's remote debugging implementation.
pub fn launch(config: &BrowserConfig) -> Result<LaunchedProcess> {
    let executable = match &config.executable {
        Some(path) => path.clone(),
        None => default_executable()?,
    };

    let port = config.port.unwrap_or(0);
    let mut command = ProcessCommand::new(executable);
    command
        .arg(format!("--remote-debugging-port={port}"))
        .arg("--no-first-run")
        .arg("--no-default-browser-check");
    if config.headless {
        command.arg("--headless=new");
    }
    for arg in &config.args {
        command.arg(arg);
    }
    if let Some(envs) = &config.process_envs {
        command.envs(envs);
    }
    command.stderr(Stdio::piped()).stdout(Stdio::null()).stdin(Stdio::null());

    let mut child = command.spawn().map_err(Error::Io)?;
    let stderr = child.stderr.take().expect("stderr was piped");
    let port = match read_debug_port(stderr, config.launch_timeout) {
        Ok(port) => port,
        Err(e) => {
            let _ = child.kill();
            return Err(e);
        }
    };

    Ok(LaunchedProcess { child, port })
}

/// Reads stderr lines on a dedicated thread and watches for the port banner
/// with a real wall-clock deadline (`recv_timeout`), rather than checking the
/// clock only between blocking `read_line` calls — a process that keeps its
/// stderr pipe open without ever printing the banner would otherwise hang
/// `launch()` past `config.launch_timeout` forever (SPEC_FULL.md "a single
/// launch timeout"). The reader thread outlives this call on timeout; it
/// exits once the killed child's pipe closes.
fn read_debug_port(stderr: impl std::io::Read + Send + 'static, timeout: Duration) -> Result<u16> {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        return;
                    }
                }
            }
        }
    });

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Transport(TransportError::ConnectionFailed(
                "timed out waiting for the engine's debugging-port banner".into(),
            )));
        }
        match rx.recv_timeout(remaining) {
            Ok(line) => {
                if let Some(port) = parse_port_banner(&line) {
                    return Ok(port);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(Error::Transport(TransportError::ConnectionFailed(
                    "timed out waiting for the engine's debugging-port banner".into(),
                )));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Error::Transport(TransportError::ConnectionFailed(
                    "engine process exited before printing a debugging-port banner".into(),
                )));
            }
        }
    }
}

fn parse_port_banner(line: &str) -> Option<u16> {
    let idx = line.find("ws://")?;
    let rest = &line[idx + "ws://".len()..];
    let after_host = rest.split_once(':')?.1;
    let port_str: String = after_host.chars().take_while(|c| c.is_ascii_digit()).collect();
    port_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_port_from_devtools_banner() {
        let line = "DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc-def\n";
        assert_eq!(parse_port_banner(line), Some(9222));
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert_eq!(parse_port_banner("[1234:5678:INFO] something else entirely\n"), None);
    }
}
