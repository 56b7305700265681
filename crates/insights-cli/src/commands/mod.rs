pub mod completions;
pub mod doctor;
pub mod man_pages;
pub mod package;
pub mod run;
pub mod stop;
pub mod version;

use indicatif::{ProgressBar, ProgressStyle};
use insights_core::config::credentials_dir;
use insights_core::{CoreError, Progress, ProgressSession, Report, Settings, Silent};
use insights_runtime::{detect_engine, ContainerSpec, EngineBinding};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Animated spinner for interactive terminals. Each finished step is left
/// on screen as a ✓ or ✗ line.
#[derive(Default)]
pub struct TermSpinner {
    active: Option<(ProgressBar, String)>,
}

impl Progress for TermSpinner {
    fn start(&mut self, message: &str) {
        self.stop();
        self.active = Some((spinner(message), message.to_owned()));
    }

    fn stop(&mut self) {
        if let Some((pb, msg)) = self.active.take() {
            spin_ok(&pb, &msg);
        }
    }

    fn fail(&mut self) {
        if let Some((pb, msg)) = self.active.take() {
            spin_fail(&pb, &msg);
        }
    }
}

/// Pick the indicator for this invocation: nothing for JSON or piped stderr,
/// the plain glyph spinner when asked for, the animated one otherwise.
pub fn progress_for(json: bool, plain: bool) -> Box<dyn Progress> {
    if json || !console::Term::stderr().is_term() {
        Box::new(Silent)
    } else if plain {
        Box::new(ProgressSession::stderr())
    } else {
        Box::new(TermSpinner::default())
    }
}

pub fn resolve_engine(settings: &Settings) -> Result<EngineBinding, String> {
    let binding = match settings.engine.as_deref() {
        Some(program) => EngineBinding::from_override(program),
        None => detect_engine(),
    };
    binding.map_err(|e| e.to_string())
}

pub fn container_spec(settings: &Settings) -> Result<ContainerSpec, String> {
    let credentials = credentials_dir().map_err(|e| e.to_string())?;
    Ok(ContainerSpec::new(credentials).with_image(&settings.image))
}

/// Render an error together with any captured command output or container logs.
pub fn describe(err: &CoreError) -> String {
    match err.diagnostics() {
        Some(details) => format!("{err}\n\n{}", indent(details)),
        None => err.to_string(),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_report(report: &Report, json: bool) -> Result<u8, String> {
    if json {
        let payload = serde_json::json!({
            "status": "completed",
            "package": report.package.as_str(),
            "report": report.report_path.display().to_string(),
            "dashboard": report.dashboard_url,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("Report Exported:  {}", report.report_path.display());
        println!("Report Dashboard:  {}", report.dashboard_url);
    }
    Ok(EXIT_SUCCESS)
}
