use super::{container_spec, resolve_engine, EXIT_FAILURE, EXIT_SUCCESS};
use insights_core::config::credentials_dir;
use insights_core::{CoreError, Settings};
use insights_runtime::{CommandInvocation, CommandRunner, EngineBinding, ProcessRunner};

pub fn run(settings: Result<Settings, CoreError>, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let settings = match settings {
        Ok(s) => {
            checks.push(Check::pass("config", "Configuration loaded"));
            s
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail("config", &format!("Configuration invalid: {e}")));
            Settings::default()
        }
    };

    check_credentials(&mut checks);
    let engine = check_engine(&settings, &mut checks, &mut all_pass);

    print_results(&checks, engine.as_ref(), all_pass, json_output)
}

fn check_credentials(checks: &mut Vec<Check>) {
    match credentials_dir() {
        Ok(dir) if dir.is_dir() => checks.push(Check::pass(
            "credentials",
            &format!("AWS config directory found at {}", dir.display()),
        )),
        Ok(dir) => checks.push(Check::warn(
            "credentials",
            &format!("No AWS config directory at {}", dir.display()),
        )),
        Err(e) => checks.push(Check::warn("credentials", &e.to_string())),
    }
}

fn check_engine(
    settings: &Settings,
    checks: &mut Vec<Check>,
    all_pass: &mut bool,
) -> Option<EngineBinding> {
    let engine = match resolve_engine(settings) {
        Ok(engine) => {
            checks.push(Check::pass(
                "engine",
                &format!("Container engine: {engine}"),
            ));
            engine
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("engine", &e));
            return None;
        }
    };

    let runner = ProcessRunner::new(&engine);
    if let Err(e) = runner.run(&CommandInvocation::new(["version"])) {
        *all_pass = false;
        checks.push(Check::fail(
            "engine_daemon",
            &format!("Container daemon not reachable: {e}"),
        ));
        return Some(engine);
    }
    checks.push(Check::pass("engine_daemon", "Container daemon reachable"));

    let Ok(spec) = container_spec(settings) else {
        return Some(engine);
    };
    match runner.run(&spec.list_command()) {
        Ok(ids) if ids.trim().is_empty() => checks.push(Check::info(
            "container",
            &format!("No {} container present", spec.name),
        )),
        Ok(ids) => checks.push(Check::info(
            "container",
            &format!(
                "{} container present ({})",
                spec.name,
                ids.lines().collect::<Vec<_>>().join(", ")
            ),
        )),
        Err(e) => checks.push(Check::warn(
            "container",
            &format!("Cannot list containers: {e}"),
        )),
    }
    Some(engine)
}

fn print_results(
    checks: &[Check],
    engine: Option<&EngineBinding>,
    all_pass: bool,
    json_output: bool,
) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "engine": engine,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("TeraSky Insights Doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
