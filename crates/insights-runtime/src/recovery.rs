use crate::container::logs_command;
use crate::executor::{CommandInvocation, CommandRunner};
use crate::RuntimeError;
use tracing::{info, warn};

/// Successful outcome of a recovered execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub output: String,
    pub attempts: u32,
}

impl Execution {
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Run `invocation` with at most one retry (only if the invocation allows it).
///
/// When the final attempt fails, the logs of `container` are fetched on a
/// best-effort basis and attached to the returned
/// [`RuntimeError::Unrecoverable`]. The caller treats that error as fatal.
pub fn execute<R>(
    runner: &R,
    invocation: &CommandInvocation,
    container: &str,
) -> Result<Execution, RuntimeError>
where
    R: CommandRunner + ?Sized,
{
    let max_attempts = if invocation.retry() { 2 } else { 1 };
    let mut attempts = 0;
    loop {
        attempts += 1;
        match runner.run(invocation) {
            Ok(output) => {
                if attempts > 1 {
                    info!("command succeeded on retry");
                }
                return Ok(Execution { output, attempts });
            }
            Err(e) if attempts < max_attempts => {
                warn!("{e}; retrying once");
            }
            Err(e) => {
                let logs = fetch_logs(runner, container);
                return Err(RuntimeError::Unrecoverable {
                    source: Box::new(e),
                    attempts,
                    logs,
                });
            }
        }
    }
}

fn fetch_logs<R>(runner: &R, container: &str) -> Option<String>
where
    R: CommandRunner + ?Sized,
{
    match runner.run(&logs_command(container)) {
        Ok(logs) => Some(logs),
        Err(e) => {
            warn!("could not fetch logs of {container}; is the container daemon running? ({e})");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Reply, ScriptedRunner};

    fn restart() -> CommandInvocation {
        CommandInvocation::new(["exec", "box", "restart"]).with_retry()
    }

    #[test]
    fn first_try_success_runs_once() {
        let runner = ScriptedRunner::new().ok("restart", "started");
        let exec = execute(&runner, &restart(), "box").unwrap();
        assert_eq!(exec.output, "started");
        assert!(!exec.retried());
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn fail_once_then_succeed_runs_twice() {
        let runner = ScriptedRunner::new()
            .script("restart", [Reply::fail("db warming up"), Reply::ok("started")]);
        let exec = execute(&runner, &restart(), "box").unwrap();
        assert_eq!(exec.attempts, 2);
        assert!(exec.retried());
        assert_eq!(runner.call_count(), 2);
        assert_eq!(runner.count_matching("logs"), 0);
    }

    #[test]
    fn fail_twice_fetches_logs_once() {
        let runner = ScriptedRunner::new()
            .fail("restart", "still down")
            .ok("logs box", "postgres: starting");
        let err = execute(&runner, &restart(), "box").unwrap_err();
        assert_eq!(runner.count_matching("restart"), 2);
        assert_eq!(runner.count_matching("logs"), 1);
        assert_eq!(runner.call_count(), 3);
        match err {
            RuntimeError::Unrecoverable { attempts, logs, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(logs.as_deref(), Some("postgres: starting"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_retry_fails_after_single_attempt() {
        let runner = ScriptedRunner::new().fail("cp", "no such file");
        let inv = CommandInvocation::new(["cp", "box:/mods/x.csv", "x.csv"]);
        let err = execute(&runner, &inv, "box").unwrap_err();
        assert_eq!(runner.count_matching("cp"), 1);
        assert!(matches!(err, RuntimeError::Unrecoverable { attempts: 1, .. }));
    }

    #[test]
    fn log_fetch_failure_keeps_original_error() {
        let runner = ScriptedRunner::new()
            .fail("restart", "original output")
            .fail("logs", "daemon not running");
        let err = execute(&runner, &restart(), "box").unwrap_err();
        match &err {
            RuntimeError::Unrecoverable { source, logs, .. } => {
                assert!(logs.is_none());
                assert!(source.to_string().contains("restart"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.diagnostics(), Some("original output"));
    }
}
