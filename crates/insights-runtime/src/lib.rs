//! Execution layer for TeraSky Insights.
//!
//! This crate talks to the container engine: it detects which engine binary is
//! installed (`EngineBinding`), runs single engine invocations through the
//! `CommandRunner` trait, wraps them in a bounded retry with diagnostic log
//! capture (`recovery`), polls the managed container for its readiness
//! sentinel (`readiness`), and builds the argument vectors for every command
//! issued against the managed container (`container`).

pub mod container;
pub mod engine;
pub mod executor;
pub mod mock;
pub mod readiness;
pub mod recovery;

pub use container::{ContainerSpec, Package, PACKAGES};
pub use engine::{detect_engine, detect_engine_with, EngineBinding, ENGINE_CANDIDATES};
pub use executor::{CommandInvocation, CommandRunner, ProcessRunner};
pub use readiness::{Readiness, ReadinessPoller, ReadinessStrategy};
pub use recovery::{execute, Execution};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no container engine detected (tried: {tried}); install docker or podman")]
    EngineNotFound { tried: String },
    #[error("container engine '{0}' does not respond to --version")]
    EngineUnavailable(String),
    #[error("`{command}` failed: {reason}")]
    ExecFailed {
        command: String,
        reason: String,
        output: String,
    },
    #[error("{source} (gave up after {attempts} attempt(s))")]
    Unrecoverable {
        #[source]
        source: Box<RuntimeError>,
        attempts: u32,
        logs: Option<String>,
    },
}

impl RuntimeError {
    /// Captured text that helps explain the failure: container logs when the
    /// recovery policy managed to fetch them, otherwise the raw command output.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ExecFailed { output, .. } if !output.is_empty() => Some(output),
            Self::Unrecoverable { logs: Some(logs), .. } if !logs.is_empty() => Some(logs),
            Self::Unrecoverable { source, .. } => source.diagnostics(),
            _ => None,
        }
    }
}
