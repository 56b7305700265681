use super::{container_spec, describe, json_pretty, EXIT_SUCCESS};
use insights_core::config::lock_path;
use insights_core::{Controller, InvocationLock, Progress, Settings};
use insights_runtime::{EngineBinding, ProcessRunner};

pub fn run(
    engine: &EngineBinding,
    settings: &Settings,
    progress: &mut dyn Progress,
    json: bool,
) -> Result<u8, String> {
    let lock_file = lock_path().map_err(|e| e.to_string())?;
    let _lock = InvocationLock::acquire(&lock_file).map_err(|e| e.to_string())?;

    let runner = ProcessRunner::new(engine);
    let spec = container_spec(settings)?;
    let name = spec.name.clone();
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read working directory: {e}"))?;

    let removed = Controller::new(&runner, spec, progress, cwd)
        .stop()
        .map_err(|e| describe(&e))?;

    if json {
        let payload = serde_json::json!({
            "container": name,
            "removed": removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else if removed == 0 {
        println!("no {name} container to stop");
    } else {
        println!("stopped and deleted {name}");
    }
    Ok(EXIT_SUCCESS)
}
