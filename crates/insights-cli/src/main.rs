mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::EXIT_FAILURE;
use insights_core::{CoreError, EngineBinding, Progress, RunRequest, Settings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "terasky-insights",
    version,
    about = "Tool for TeraSky Insights assessments"
)]
struct Cli {
    /// Path to a TOML config file (default: ~/.config/terasky-insights/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable debug mode: log every engine command and its output.
    #[arg(long, default_value_t = false, global = true)]
    debug: bool,

    /// Enable trace-level logging (more detailed than --debug).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Use a plain ASCII spinner instead of the animated one.
    #[arg(long, default_value_t = false, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a container with AWS profile, IAM role and assessment package.
    Run {
        /// AWS local profile name.
        #[arg(long)]
        profile: String,
        /// Assessment package to use (aws-finops, aws-top-10, aws-well-architected).
        #[arg(long)]
        package: String,
        /// IAM role to assume.
        #[arg(long)]
        role: Option<String>,
    },
    /// Stop and delete the terasky-insights container.
    Stop,
    /// Load a package into the running container (aws-finops, aws-top-10, aws-well-architected).
    Package {
        /// Package name.
        package: String,
    },
    /// Print version information.
    Version,
    /// Run diagnostic checks on the engine, container and credentials.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("INSIGHTS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let plain = cli.plain;
    let config = cli.config;

    let result = match cli.command {
        Commands::Run {
            profile,
            package,
            role,
        } => with_engine(config.as_deref(), json_output, plain, |engine, settings, progress| {
            commands::run::run(
                engine,
                settings,
                RunRequest {
                    package: &package,
                    profile: &profile,
                    role: role.as_deref(),
                },
                progress,
                json_output,
            )
        }),
        Commands::Stop => {
            with_engine(config.as_deref(), json_output, plain, |engine, settings, progress| {
                commands::stop::run(engine, settings, progress, json_output)
            })
        }
        Commands::Package { package } => {
            with_engine(config.as_deref(), json_output, plain, |engine, settings, progress| {
                commands::package::run(engine, settings, &package, progress, json_output)
            })
        }
        Commands::Version => commands::version::run(json_output),
        Commands::Doctor => commands::doctor::run(load_settings(config.as_deref()), json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Load settings and bind the container engine, then hand both to `f`.
fn with_engine(
    config: Option<&Path>,
    json_output: bool,
    plain: bool,
    f: impl FnOnce(&EngineBinding, &Settings, &mut dyn Progress) -> Result<u8, String>,
) -> Result<u8, String> {
    let settings = load_settings(config).map_err(|e| e.to_string())?;
    let engine = commands::resolve_engine(&settings)?;
    tracing::debug!("using container engine {engine}");
    let mut progress = commands::progress_for(json_output, plain);
    f(&engine, &settings, progress.as_mut())
}

fn load_settings(path: Option<&Path>) -> Result<Settings, CoreError> {
    let settings = match path {
        Some(p) => Settings::load(p)?,
        None => Settings::load_default()?,
    };
    Ok(settings.with_env_overrides())
}
