use crate::config::Policy;
use crate::lifecycle::{validate_transition, RunState};
use crate::progress::Progress;
use crate::{validate_package, CoreError};
use insights_runtime::recovery::{execute, Execution};
use insights_runtime::{
    CommandInvocation, CommandRunner, ContainerSpec, Package, Readiness, ReadinessPoller,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Inputs for a full `run`.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub package: &'a str,
    pub profile: &'a str,
    pub role: Option<&'a str>,
}

/// Where the results of a completed workflow ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub package: Package,
    pub report_path: PathBuf,
    pub dashboard_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(Report),
    /// Readiness wait exhausted; the container was left running.
    NotReady { attempts: u32 },
}

/// Drives the managed container through one invocation.
///
/// All engine calls are synchronous and go through the recovery policy, except
/// readiness probes which go straight to the runner. The progress indicator is
/// started around each blocking step and always stopped before returning, so
/// error output never interleaves with it.
pub struct Controller<'a> {
    runner: &'a dyn CommandRunner,
    spec: ContainerSpec,
    policy: Policy,
    progress: &'a mut dyn Progress,
    output_dir: PathBuf,
    sleep: fn(Duration),
    state: RunState,
    history: Vec<RunState>,
}

impl<'a> Controller<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        spec: ContainerSpec,
        progress: &'a mut dyn Progress,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            spec,
            policy: Policy::default(),
            progress,
            output_dir: output_dir.into(),
            sleep: std::thread::sleep,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the blocking sleep used between readiness probes.
    #[must_use]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Replace any existing container with a fresh one and run the workflow.
    pub fn run(&mut self, request: RunRequest<'_>) -> Result<RunOutcome, CoreError> {
        self.advance(RunState::Validating)?;
        let package = validate_package(request.package)?;

        self.advance(RunState::StoppingPrevious)?;
        self.step("stopping previous container", Self::remove_existing)?;

        self.advance(RunState::Starting)?;
        let start = self.spec.run_command(request.profile, request.role);
        self.step("pulling image and starting container", |c| c.exec(&start))?;

        self.advance(RunState::PollingReadiness)?;
        let readiness = self.step("waiting for container readiness", |c| Ok(c.await_ready()))?;

        if let Readiness::NotReady { attempts } = readiness {
            self.advance(RunState::NotReady)?;
            self.advance(RunState::Aborted)?;
            warn!("container not ready after {attempts} probe(s); leaving it running");
            if self.policy.fatal_on_timeout {
                return Err(CoreError::ReadinessTimeout(attempts));
            }
            return Ok(RunOutcome::NotReady { attempts });
        }
        self.advance(RunState::Ready)?;

        self.advance(RunState::RunningWorkflow)?;
        let report = self.workflow(package)?;
        self.advance(RunState::Done)?;
        Ok(RunOutcome::Completed(report))
    }

    /// Run the workflow for `package` against the already running container.
    pub fn load_package(&mut self, package: &str) -> Result<Report, CoreError> {
        self.advance(RunState::Validating)?;
        let package = validate_package(package)?;

        self.advance(RunState::RunningWorkflow)?;
        let report = self.workflow(package)?;
        self.advance(RunState::Done)?;
        Ok(report)
    }

    /// Stop and remove the managed container. Returns how many were removed.
    pub fn stop(&mut self) -> Result<usize, CoreError> {
        self.advance(RunState::StoppingPrevious)?;
        let removed = self.step("stopping container", Self::remove_existing)?;
        self.advance(RunState::Done)?;
        Ok(removed)
    }

    fn workflow(&mut self, package: Package) -> Result<Report, CoreError> {
        let mut restart = self.spec.restart_service_command(package);
        if self.policy.retry_service_restart {
            restart = restart.with_retry();
        }
        let restarted = self.step("restarting assessment service", |c| c.exec(&restart))?;
        if restarted.retried() {
            info!("assessment service started on second attempt");
        }

        let check = self.spec.check_command(package);
        self.step("running assessment checks", |c| c.exec(&check))?;

        let report_path = self.output_dir.join(package.report_file_name());
        let copy = self.spec.copy_report_command(package, &report_path);
        self.step("copying report", |c| c.exec(&copy))?;

        Ok(Report {
            package,
            report_path,
            dashboard_url: self.spec.dashboard_url(),
        })
    }

    /// Query-then-conditional-remove; a no-op when nothing matches.
    fn remove_existing(&self) -> Result<usize, CoreError> {
        let listed = self.exec(&self.spec.list_command())?;
        let ids: Vec<&str> = listed
            .output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if ids.is_empty() {
            debug!("no existing {} container", self.spec.name);
        }
        for id in &ids {
            info!("removing container {id}");
            self.exec(&ContainerSpec::remove_command(id))?;
        }
        Ok(ids.len())
    }

    fn await_ready(&self) -> Readiness {
        ReadinessPoller::new(self.policy.readiness, self.spec.readiness_probe())
            .wait_with(self.runner, self.sleep)
    }

    fn exec(&self, invocation: &CommandInvocation) -> Result<Execution, CoreError> {
        Ok(execute(self.runner, invocation, &self.spec.name)?)
    }

    fn step<T>(
        &mut self,
        message: &str,
        f: impl FnOnce(&Self) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        info!("{message}");
        self.progress.start(message);
        let result = f(&*self);
        if result.is_ok() {
            self.progress.stop();
        } else {
            self.progress.fail();
        }
        result
    }

    fn advance(&mut self, to: RunState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        debug!("run state: {} -> {to}", self.state);
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;
    use insights_runtime::mock::{Reply, ScriptedRunner};

    fn no_sleep(_: Duration) {}

    fn spec() -> ContainerSpec {
        ContainerSpec::new("/home/alice/.aws")
    }

    fn request(package: &str) -> RunRequest<'_> {
        RunRequest {
            package,
            profile: "prod",
            role: None,
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Progress for Recorder {
        fn start(&mut self, message: &str) {
            self.events.push(format!("start:{message}"));
        }

        fn stop(&mut self) {
            self.events.push("stop".to_owned());
        }
    }

    #[test]
    fn invalid_package_touches_nothing() {
        let runner = ScriptedRunner::new();
        let mut progress = Silent;
        let mut controller =
            Controller::new(&runner, spec(), &mut progress, "/work").with_sleep(no_sleep);

        let err = controller.run(request("aws-top-11")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPackage { .. }));
        assert_eq!(runner.call_count(), 0);
        assert_eq!(controller.state(), RunState::Validating);
    }

    #[test]
    fn invalid_package_reload_touches_nothing() {
        let runner = ScriptedRunner::new();
        let mut progress = Silent;
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work");
        assert!(controller.load_package("../etc").is_err());
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn stop_with_no_container_issues_no_removal() {
        let runner = ScriptedRunner::new().ok("ps -a", "");
        let mut progress = Silent;
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work");

        assert_eq!(controller.stop().unwrap(), 0);
        assert_eq!(runner.subcommands(), vec!["ps"]);
        assert_eq!(controller.state(), RunState::Done);
    }

    #[test]
    fn stop_removes_every_listed_container() {
        let runner = ScriptedRunner::new().ok("ps -a", "abc123\n def456 \n");
        let mut progress = Silent;
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work");

        assert_eq!(controller.stop().unwrap(), 2);
        let calls = runner.calls();
        assert_eq!(calls[1].args(), ["rm", "-f", "-v", "abc123"]);
        assert_eq!(calls[2].args(), ["rm", "-f", "-v", "def456"]);
    }

    #[test]
    fn not_ready_aborts_gracefully_and_keeps_container() {
        let runner = ScriptedRunner::new().ok("test -f /tmp/ready", "0");
        let mut progress = Silent;
        let mut controller =
            Controller::new(&runner, spec(), &mut progress, "/work").with_sleep(no_sleep);

        let outcome = controller.run(request("aws-finops")).unwrap();
        assert_eq!(outcome, RunOutcome::NotReady { attempts: 30 });
        assert_eq!(controller.state(), RunState::Aborted);
        assert_eq!(runner.count_matching("rm -f"), 0);
        assert_eq!(runner.count_matching("service start"), 0);
        assert_eq!(runner.count_matching("test -f /tmp/ready"), 30);
    }

    #[test]
    fn not_ready_is_fatal_when_policy_says_so() {
        let runner = ScriptedRunner::new().ok("test -f /tmp/ready", "0");
        let mut progress = Silent;
        let policy = Policy {
            fatal_on_timeout: true,
            ..Policy::default()
        };
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work")
            .with_policy(policy)
            .with_sleep(no_sleep);

        let err = controller.run(request("aws-finops")).unwrap_err();
        assert!(matches!(err, CoreError::ReadinessTimeout(30)));
    }

    #[test]
    fn restart_without_retry_policy_fails_on_first_error() {
        let runner = ScriptedRunner::new()
            .ok("test -f /tmp/ready", "1")
            .script(
                "service start",
                [Reply::fail("db warming up"), Reply::ok("")],
            );
        let mut progress = Silent;
        let policy = Policy {
            retry_service_restart: false,
            ..Policy::default()
        };
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work")
            .with_policy(policy)
            .with_sleep(no_sleep);

        let err = controller.run(request("aws-top-10")).unwrap_err();
        assert_eq!(runner.count_matching("service start"), 1);
        assert_eq!(runner.count_matching("logs terasky-insights"), 1);
        assert_eq!(controller.state(), RunState::RunningWorkflow);
        assert!(err.to_string().contains("1 attempt(s)"));
    }

    #[test]
    fn flaky_restart_recovers_with_retry() {
        let runner = ScriptedRunner::new()
            .ok("test -f /tmp/ready", "1")
            .script(
                "service start",
                [Reply::fail("db warming up"), Reply::ok("")],
            );
        let mut progress = Silent;
        let mut controller =
            Controller::new(&runner, spec(), &mut progress, "/work").with_sleep(no_sleep);

        let outcome = controller.run(request("aws-top-10")).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(runner.count_matching("service start"), 2);
        assert_eq!(runner.count_matching("logs"), 0);
    }

    #[test]
    fn failing_copy_fetches_logs_and_stops_progress() {
        let runner = ScriptedRunner::new()
            .ok("test -f /tmp/ready", "1")
            .fail("terasky-insights:/mods", "no such file")
            .ok("logs terasky-insights", "steampipe exited");
        let mut progress = Recorder::default();
        let mut controller =
            Controller::new(&runner, spec(), &mut progress, "/work").with_sleep(no_sleep);

        let err = controller.run(request("aws-top-10")).unwrap_err();
        assert_eq!(err.diagnostics(), Some("steampipe exited"));
        drop(controller);
        assert_eq!(progress.events.last().map(String::as_str), Some("stop"));
    }

    #[test]
    fn every_start_is_paired_with_stop() {
        let runner = ScriptedRunner::new().ok("test -f /tmp/ready", "1");
        let mut progress = Recorder::default();
        let mut controller =
            Controller::new(&runner, spec(), &mut progress, "/work").with_sleep(no_sleep);
        controller.run(request("aws-well-architected")).unwrap();
        drop(controller);

        let mut active = false;
        for event in &progress.events {
            if event == "stop" {
                assert!(active, "stop without start");
                active = false;
            } else {
                assert!(!active, "overlapping progress sessions");
                active = true;
            }
        }
        assert!(!active);
        assert_eq!(progress.events.len(), 12);
    }

    #[test]
    fn load_package_skips_container_replacement() {
        let runner = ScriptedRunner::new();
        let mut progress = Silent;
        let mut controller = Controller::new(&runner, spec(), &mut progress, "/work");

        let report = controller.load_package("aws-finops").unwrap();
        assert_eq!(report.report_path, PathBuf::from("/work/aws-finops.csv"));
        assert_eq!(runner.subcommands(), vec!["exec", "exec", "cp"]);
        assert_eq!(
            controller.history(),
            [
                RunState::Idle,
                RunState::Validating,
                RunState::RunningWorkflow,
                RunState::Done
            ]
        );
    }
}
