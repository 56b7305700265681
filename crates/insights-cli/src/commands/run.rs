use super::{container_spec, describe, json_pretty, print_report, EXIT_SUCCESS};
use insights_core::config::lock_path;
use insights_core::{Controller, InvocationLock, Progress, RunOutcome, RunRequest, Settings};
use insights_runtime::{EngineBinding, ProcessRunner};

pub fn run(
    engine: &EngineBinding,
    settings: &Settings,
    request: RunRequest<'_>,
    progress: &mut dyn Progress,
    json: bool,
) -> Result<u8, String> {
    let lock_file = lock_path().map_err(|e| e.to_string())?;
    let _lock = InvocationLock::acquire(&lock_file).map_err(|e| e.to_string())?;

    let runner = ProcessRunner::new(engine);
    let spec = container_spec(settings)?;
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read working directory: {e}"))?;

    let outcome = Controller::new(&runner, spec, progress, cwd)
        .with_policy(settings.policy())
        .run(request)
        .map_err(|e| describe(&e))?;

    match outcome {
        RunOutcome::Completed(report) => print_report(&report, json),
        RunOutcome::NotReady { attempts } => {
            if json {
                let payload = serde_json::json!({
                    "status": "not-ready",
                    "attempts": attempts,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                println!("Container did not become ready in time");
            }
            Ok(EXIT_SUCCESS)
        }
    }
}
