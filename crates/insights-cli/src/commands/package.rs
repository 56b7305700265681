use super::{container_spec, describe, print_report};
use insights_core::config::lock_path;
use insights_core::{Controller, InvocationLock, Progress, Settings};
use insights_runtime::{EngineBinding, ProcessRunner};

pub fn run(
    engine: &EngineBinding,
    settings: &Settings,
    package: &str,
    progress: &mut dyn Progress,
    json: bool,
) -> Result<u8, String> {
    let lock_file = lock_path().map_err(|e| e.to_string())?;
    let _lock = InvocationLock::acquire(&lock_file).map_err(|e| e.to_string())?;

    let runner = ProcessRunner::new(engine);
    let spec = container_spec(settings)?;
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read working directory: {e}"))?;

    let report = Controller::new(&runner, spec, progress, cwd)
        .with_policy(settings.policy())
        .load_package(package)
        .map_err(|e| describe(&e))?;
    print_report(&report, json)
}
