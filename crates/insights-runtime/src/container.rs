//! The managed container and the engine commands issued against it.
//!
//! Every builder returns a structured [`CommandInvocation`]. User-supplied
//! values (profile, role) travel as discrete arguments, and the package id
//! reaches in-container scripts only as a positional parameter (`$1`).

use crate::executor::CommandInvocation;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONTAINER_NAME: &str = "terasky-insights";
pub const DEFAULT_IMAGE: &str = "ghcr.io/elad-ts/terasky-insights:latest";
pub const API_PORT: u16 = 9193;
pub const DASHBOARD_PORT: u16 = 9194;

const ENTRYPOINT: &str = "/usr/local/bin/entrypoint.sh";
const CREDENTIALS_TARGET: &str = "/tmp/aws";
const MODS_DIR: &str = "/mods";
const SHELL: &str = "/bin/sh";

const PROBE_SCRIPT: &str = "test -f /tmp/ready && echo 1 || echo 0";
const RESTART_SCRIPT: &str = r#"cd "/mods/$1" && steampipe service stop --force && find /tmp -type f -name '.s.PGSQL.*.lock' -exec rm {} \; && steampipe service start --dashboard"#;
const CHECK_SCRIPT: &str =
    r#"cd "/mods/$1" && steampipe check all --output csv > "/mods/$1.csv"; exit 0"#;

/// Assessment packages shipped inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Package {
    AwsFinops,
    AwsTop10,
    AwsWellArchitected,
}

pub const PACKAGES: &[Package] = &[
    Package::AwsFinops,
    Package::AwsTop10,
    Package::AwsWellArchitected,
];

impl Package {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwsFinops => "aws-finops",
            Self::AwsTop10 => "aws-top-10",
            Self::AwsWellArchitected => "aws-well-architected",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        PACKAGES.iter().copied().find(|p| p.as_str() == id)
    }

    pub fn report_file_name(self) -> String {
        format!("{}.csv", self.as_str())
    }

    /// Comma-separated list of every accepted id, for error messages.
    pub fn allowed() -> String {
        PACKAGES
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<u16>,
    /// Host directory mounted read-only as the container's AWS config.
    pub credentials_dir: PathBuf,
    pub entrypoint: String,
}

impl ContainerSpec {
    pub fn new(credentials_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: CONTAINER_NAME.to_owned(),
            image: DEFAULT_IMAGE.to_owned(),
            ports: vec![API_PORT, DASHBOARD_PORT],
            credentials_dir: credentials_dir.into(),
            entrypoint: ENTRYPOINT.to_owned(),
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_owned();
        self
    }

    pub fn dashboard_url(&self) -> String {
        format!("http://localhost:{DASHBOARD_PORT}")
    }

    pub fn list_command(&self) -> CommandInvocation {
        CommandInvocation::new([
            "ps".to_owned(),
            "-a".to_owned(),
            "-q".to_owned(),
            "--filter".to_owned(),
            format!("name={}", self.name),
        ])
    }

    pub fn remove_command(id: &str) -> CommandInvocation {
        CommandInvocation::new(["rm", "-f", "-v", id])
    }

    pub fn run_command(&self, profile: &str, role: Option<&str>) -> CommandInvocation {
        let mut args: Vec<String> = vec!["run".to_owned(), "-d".to_owned()];
        for port in &self.ports {
            args.push("-p".to_owned());
            args.push(format!("{port}:{port}"));
        }
        args.push("-v".to_owned());
        args.push(format!(
            "{}:{CREDENTIALS_TARGET}:ro",
            self.credentials_dir.display()
        ));
        args.extend([
            "--name".to_owned(),
            self.name.clone(),
            "--pull".to_owned(),
            "always".to_owned(),
            "--entrypoint".to_owned(),
            self.entrypoint.clone(),
            self.image.clone(),
            profile.to_owned(),
        ]);
        if let Some(role) = role.filter(|r| !r.is_empty()) {
            args.push(role.to_owned());
        }
        CommandInvocation::new(args)
    }

    pub fn readiness_probe(&self) -> CommandInvocation {
        self.exec_script(PROBE_SCRIPT, None)
    }

    /// Stop the inner service, clear stale Postgres socket locks and start the
    /// dashboard again, all inside the package directory.
    pub fn restart_service_command(&self, package: Package) -> CommandInvocation {
        self.exec_script(RESTART_SCRIPT, Some(package))
    }

    /// Run every check of the package and write the CSV report. The script
    /// always exits zero: failing checks still produce a report.
    pub fn check_command(&self, package: Package) -> CommandInvocation {
        self.exec_script(CHECK_SCRIPT, Some(package))
    }

    pub fn report_path(&self, package: Package) -> String {
        format!("{MODS_DIR}/{}", package.report_file_name())
    }

    pub fn copy_report_command(&self, package: Package, dest: &Path) -> CommandInvocation {
        CommandInvocation::new([
            "cp".to_owned(),
            format!("{}:{}", self.name, self.report_path(package)),
            dest.display().to_string(),
        ])
    }

    pub fn logs_command(&self) -> CommandInvocation {
        logs_command(&self.name)
    }

    fn exec_script(&self, script: &str, package: Option<Package>) -> CommandInvocation {
        let mut args = vec![
            "exec".to_owned(),
            self.name.clone(),
            SHELL.to_owned(),
            "-c".to_owned(),
            script.to_owned(),
        ];
        if let Some(package) = package {
            // $0 for the script, then $1 = package id
            args.push("sh".to_owned());
            args.push(package.as_str().to_owned());
        }
        CommandInvocation::new(args)
    }
}

pub fn logs_command(container: &str) -> CommandInvocation {
    CommandInvocation::new(["logs", container])
}
