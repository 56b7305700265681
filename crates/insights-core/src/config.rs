use crate::CoreError;
use insights_runtime::container::DEFAULT_IMAGE;
use insights_runtime::readiness::{DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS};
use insights_runtime::ReadinessStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENGINE_ENV: &str = "INSIGHTS_ENGINE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessMode {
    Poll,
    FixedWait,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessSettings {
    pub mode: ReadinessMode,
    pub max_attempts: u32,
    pub delay_secs: u64,
    pub fixed_wait_secs: u64,
    /// Treat an exhausted readiness wait as a fatal error instead of a
    /// graceful abort that leaves the container running.
    pub fatal_on_timeout: bool,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::Poll,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_DELAY.as_secs(),
            fixed_wait_secs: 30,
            fatal_on_timeout: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySettings {
    pub retry_service_restart: bool,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            retry_service_restart: true,
        }
    }
}

/// User configuration, read from `~/.config/terasky-insights/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Engine program name or path; skips detection when set.
    pub engine: Option<String>,
    pub image: String,
    pub readiness: ReadinessSettings,
    pub recovery: RecoverySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: None,
            image: DEFAULT_IMAGE.to_owned(),
            readiness: ReadinessSettings::default(),
            recovery: RecoverySettings::default(),
        }
    }
}

/// The policy knobs the controller acts on, derived from [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub readiness: ReadinessStrategy,
    pub fatal_on_timeout: bool,
    pub retry_service_restart: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Settings::default().policy()
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        let settings: Self =
            toml::from_str(content).map_err(|e| CoreError::Config(format!("invalid config: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Load the default config file if it exists, otherwise built-in defaults.
    pub fn load_default() -> Result<Self, CoreError> {
        let path = default_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `INSIGHTS_ENGINE` on top of the file settings.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_engine_override(std::env::var(ENGINE_ENV).ok())
    }

    #[must_use]
    pub fn with_engine_override(mut self, engine: Option<String>) -> Self {
        if let Some(engine) = engine.filter(|e| !e.trim().is_empty()) {
            self.engine = Some(engine);
        }
        self
    }

    pub fn readiness_strategy(&self) -> ReadinessStrategy {
        match self.readiness.mode {
            ReadinessMode::Poll => ReadinessStrategy::Poll {
                max_attempts: self.readiness.max_attempts,
                delay: Duration::from_secs(self.readiness.delay_secs),
            },
            ReadinessMode::FixedWait => {
                ReadinessStrategy::FixedWait(Duration::from_secs(self.readiness.fixed_wait_secs))
            }
        }
    }

    pub fn policy(&self) -> Policy {
        Policy {
            readiness: self.readiness_strategy(),
            fatal_on_timeout: self.readiness.fatal_on_timeout,
            retry_service_restart: self.recovery.retry_service_restart,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.readiness.max_attempts == 0 {
            return Err(CoreError::Config(
                "readiness.max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(CoreError::Config("image must not be empty".to_owned()));
        }
        Ok(())
    }
}

pub fn home_dir() -> Result<PathBuf, CoreError> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| CoreError::Config("HOME not set".to_owned()))
}

pub fn default_config_path() -> Result<PathBuf, CoreError> {
    Ok(home_dir()?.join(".config/terasky-insights/config.toml"))
}

/// `~/.aws`, mounted read-only into the container.
pub fn credentials_dir() -> Result<PathBuf, CoreError> {
    Ok(home_dir()?.join(".aws"))
}

pub fn lock_path() -> Result<PathBuf, CoreError> {
    Ok(home_dir()?.join(".cache/terasky-insights/run.lock"))
}
