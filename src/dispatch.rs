//! Local executor bridge.
//!
//! Translates routed input into multiplexer keystrokes. Literal text and the
//! terminating Enter are always sent as two discrete `send-keys` invocations
//! with a short settle delay between them: the receiving program may treat a
//! newline embedded in pasted text differently from a synthesized keypress.
//!
//! The [`InputDispatcher`] trait is the seam the router holds; the system
//! implementation shells out to `tmux`, optionally wrapped in `ssh` for
//! direct-SSH targets. Window focusing is delegated to an opaque
//! [`TerminalActivator`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::address::FocusAddress;

/// Delay between the literal text and the Enter keypress.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("pane not found: {0}")]
    PaneNotFound(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("{program} failed: {stderr}")]
    CommandFailed {
        program: &'static str,
        stderr: String,
    },
}

/// Where the keystrokes should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// A pane of the local multiplexer server.
    Local { pane: String },
    /// A pane of a multiplexer server on a host reached over SSH.
    Ssh {
        host: String,
        user: String,
        port: u16,
        pane: String,
    },
}

#[async_trait]
pub trait InputDispatcher: Send + Sync {
    /// Deliver `text` as literal, non-interpreted input to the target pane,
    /// then terminate the line with a separate keypress.
    async fn dispatch(&self, target: &DispatchTarget, text: &str) -> Result<(), DispatchError>;
}

/// Production dispatcher: `tmux send-keys`, over `ssh` when needed.
pub struct TmuxDispatcher;

#[async_trait]
impl InputDispatcher for TmuxDispatcher {
    async fn dispatch(&self, target: &DispatchTarget, text: &str) -> Result<(), DispatchError> {
        run_step(target, &literal_step(pane_of(target), text)).await?;
        tokio::time::sleep(SETTLE_DELAY).await;
        run_step(target, &enter_step(pane_of(target))).await
    }
}

fn pane_of(target: &DispatchTarget) -> &str {
    match target {
        DispatchTarget::Local { pane } => pane,
        DispatchTarget::Ssh { pane, .. } => pane,
    }
}

/// `tmux send-keys -t <pane> -l -- <text>`. `-l` keeps tmux from
/// interpreting key names, `--` keeps a leading dash from reading as a flag.
fn literal_step(pane: &str, text: &str) -> Vec<String> {
    vec![
        "send-keys".into(),
        "-t".into(),
        pane.into(),
        "-l".into(),
        "--".into(),
        text.into(),
    ]
}

fn enter_step(pane: &str) -> Vec<String> {
    vec!["send-keys".into(), "-t".into(), pane.into(), "Enter".into()]
}

/// Wrap a tmux invocation for a remote host. The remote shell re-splits the
/// command line, so every tmux argument is single-quoted.
fn ssh_command(host: &str, user: &str, port: u16, tmux_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ConnectTimeout=5".to_string(),
        "-p".to_string(),
        port.to_string(),
        format!("{user}@{host}"),
        "tmux".to_string(),
    ];
    args.extend(tmux_args.iter().map(|a| shell_quote(a)));
    args
}

/// Single-quote a string for a POSIX shell.
fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@' | '/'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

async fn run_step(target: &DispatchTarget, tmux_args: &[String]) -> Result<(), DispatchError> {
    let (program, args): (&'static str, Vec<String>) = match target {
        DispatchTarget::Local { .. } => ("tmux", tmux_args.to_vec()),
        DispatchTarget::Ssh {
            host, user, port, ..
        } => ("ssh", ssh_command(host, user, *port, tmux_args)),
    };

    let output = Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|e| DispatchError::Spawn { program, source: e })?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(classify_failure(program, stderr, pane_of(target)))
}

fn classify_failure(program: &'static str, stderr: String, pane: &str) -> DispatchError {
    if stderr.contains("can't find pane")
        || stderr.contains("can't find session")
        || stderr.contains("no server running")
    {
        DispatchError::PaneNotFound(pane.to_string())
    } else {
        DispatchError::CommandFailed { program, stderr }
    }
}

// ── Terminal activation ───────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ActivateError {
    #[error("no terminal activator is configured on this host")]
    Unavailable,

    #[error("terminal activator failed: {0}")]
    Failed(String),
}

/// Opaque window/tab focuser. Takes a resolved target, returns success or
/// failure; how the window actually comes to the foreground is not this
/// crate's concern.
#[async_trait]
pub trait TerminalActivator: Send + Sync {
    async fn activate(&self, target: &FocusAddress) -> Result<(), ActivateError>;
}

/// Runs a configured external program with the encoded address as its only
/// argument.
pub struct CommandActivator {
    program: PathBuf,
}

impl CommandActivator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TerminalActivator for CommandActivator {
    async fn activate(&self, target: &FocusAddress) -> Result<(), ActivateError> {
        let encoded = target
            .encode()
            .map_err(|e| ActivateError::Failed(e.to_string()))?;
        let output = Command::new(&self.program)
            .arg(&encoded)
            .output()
            .await
            .map_err(|e| ActivateError::Failed(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ActivateError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Placeholder for hosts without any focusing capability.
pub struct NoActivator;

#[async_trait]
impl TerminalActivator for NoActivator {
    async fn activate(&self, _target: &FocusAddress) -> Result<(), ActivateError> {
        Err(ActivateError::Unavailable)
    }
}
