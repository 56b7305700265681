use crate::RuntimeError;
use serde::Serialize;
use std::process::{Command, Stdio};
use tracing::debug;

/// Engine binaries that share the `ps`/`run`/`exec`/`cp`/`logs` command surface,
/// in order of preference.
pub const ENGINE_CANDIDATES: &[&str] = &["docker", "podman", "nerdctl"];

/// The container engine executable every command is issued through.
///
/// Resolved once at startup and passed by reference; there is no way to
/// construct one without either probing the host or naming it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineBinding {
    program: String,
}

impl EngineBinding {
    /// Bind to an engine without probing. Intended for tests and for callers
    /// that already verified the program exists.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Bind to an explicitly configured engine, verifying it responds.
    pub fn from_override(program: &str) -> Result<Self, RuntimeError> {
        if responds(program) {
            Ok(Self::new(program))
        } else {
            Err(RuntimeError::EngineUnavailable(program.to_owned()))
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl std::fmt::Display for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)
    }
}

fn responds(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Probe the host for the first available engine in [`ENGINE_CANDIDATES`].
pub fn detect_engine() -> Result<EngineBinding, RuntimeError> {
    detect_engine_with(ENGINE_CANDIDATES, responds)
}

/// Same as [`detect_engine`] with an injectable presence check.
pub fn detect_engine_with(
    candidates: &[&str],
    present: impl Fn(&str) -> bool,
) -> Result<EngineBinding, RuntimeError> {
    for candidate in candidates {
        if present(candidate) {
            debug!("detected container engine: {candidate}");
            return Ok(EngineBinding::new(*candidate));
        }
        debug!("container engine not found: {candidate}");
    }
    Err(RuntimeError::EngineNotFound {
        tried: candidates.join(", "),
    })
}
