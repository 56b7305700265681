//! Orchestration layer for TeraSky Insights.
//!
//! This crate drives the managed assessment container through its whole run:
//! package validation, stop-before-start replacement of the container,
//! readiness waiting, the inner service workflow and report copy-out
//! (`Controller`). It also owns policy configuration (`Settings`), the
//! progress indicator shown during blocking steps (`Progress`), the run state
//! machine and the single-invocation lock.

pub mod concurrency;
pub mod config;
pub mod controller;
pub mod lifecycle;
pub mod progress;

pub use concurrency::InvocationLock;
pub use config::{Policy, ReadinessMode, Settings};
pub use controller::{Controller, Report, RunOutcome, RunRequest};
pub use lifecycle::{validate_transition, RunState};
pub use progress::{Progress, ProgressSession, Silent};

pub use insights_runtime::{EngineBinding, Package};

use insights_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid package '{given}'; allowed values are: {allowed}")]
    InvalidPackage { given: String, allowed: String },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("config error: {0}")]
    Config(String),
    #[error("container did not become ready after {0} probe(s)")]
    ReadinessTimeout(u32),
    #[error("another terasky-insights invocation is already running (lock: {0})")]
    Busy(String),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Container logs or captured command output attached to the failure.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Runtime(e) => e.diagnostics(),
            _ => None,
        }
    }
}

/// Parse a package id, rejecting anything outside the fixed set.
pub fn validate_package(id: &str) -> Result<Package, CoreError> {
    Package::parse(id).ok_or_else(|| CoreError::InvalidPackage {
        given: id.to_owned(),
        allowed: Package::allowed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_package_accepts_known() {
        assert_eq!(validate_package("aws-top-10").unwrap(), Package::AwsTop10);
    }

    #[test]
    fn validate_package_error_lists_allowed_values() {
        let msg = validate_package("gcp-top-10").unwrap_err().to_string();
        assert!(msg.contains("gcp-top-10"));
        assert!(msg.contains("aws-finops, aws-top-10, aws-well-architected"));
    }

    #[test]
    fn runtime_errors_keep_their_message_and_diagnostics() {
        let err: CoreError = RuntimeError::ExecFailed {
            command: "docker ps".to_owned(),
            reason: "exit status: 1".to_owned(),
            output: "Cannot connect to the Docker daemon".to_owned(),
        }
        .into();
        assert!(err.to_string().starts_with("`docker ps` failed"));
        assert_eq!(err.diagnostics(), Some("Cannot connect to the Docker daemon"));
    }
}
