use crate::executor::{CommandInvocation, CommandRunner};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// How the controller decides the managed container is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStrategy {
    /// Probe the sentinel up to `max_attempts` times, sleeping `delay` between probes.
    Poll { max_attempts: u32, delay: Duration },
    /// Sleep once and assume the container is ready.
    FixedWait(Duration),
}

impl Default for ReadinessStrategy {
    fn default() -> Self {
        Self::Poll {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    NotReady { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

pub struct ReadinessPoller {
    strategy: ReadinessStrategy,
    probe: CommandInvocation,
}

impl ReadinessPoller {
    /// `probe` must print `1` when the sentinel is present and `0` otherwise.
    pub fn new(strategy: ReadinessStrategy, probe: CommandInvocation) -> Self {
        Self { strategy, probe }
    }

    pub fn wait<R>(&self, runner: &R) -> Readiness
    where
        R: CommandRunner + ?Sized,
    {
        self.wait_with(runner, std::thread::sleep)
    }

    /// Like [`Self::wait`], with the inter-attempt sleep injected.
    ///
    /// Probes run strictly one after another. A probe that fails to execute
    /// counts as not ready; exhaustion is reported, never raised.
    pub fn wait_with<R>(&self, runner: &R, mut sleep: impl FnMut(Duration)) -> Readiness
    where
        R: CommandRunner + ?Sized,
    {
        match self.strategy {
            ReadinessStrategy::FixedWait(duration) => {
                info!("waiting {}s for container start", duration.as_secs());
                sleep(duration);
                Readiness::Ready { attempts: 0 }
            }
            ReadinessStrategy::Poll {
                max_attempts,
                delay,
            } => {
                for attempt in 1..=max_attempts {
                    match runner.run(&self.probe) {
                        Ok(out) if out == "1" => {
                            debug!("container ready after {attempt} probe(s)");
                            return Readiness::Ready { attempts: attempt };
                        }
                        Ok(out) => debug!("probe {attempt}/{max_attempts}: not ready ({out})"),
                        Err(e) => debug!("probe {attempt}/{max_attempts} failed: {e}"),
                    }
                    if attempt < max_attempts {
                        sleep(delay);
                    }
                }
                Readiness::NotReady {
                    attempts: max_attempts,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Reply, ScriptedRunner};

    fn probe() -> CommandInvocation {
        CommandInvocation::new(["exec", "box", "probe"])
    }

    fn poller() -> ReadinessPoller {
        ReadinessPoller::new(ReadinessStrategy::default(), probe())
    }

    #[test]
    fn ready_on_nth_probe_sleeps_n_minus_one_times() {
        for n in [1_u32, 3, 30] {
            let mut replies: Vec<Reply> = (1..n).map(|_| Reply::ok("0")).collect();
            replies.push(Reply::ok("1"));
            let runner = ScriptedRunner::new().script("probe", replies);
            let mut delays = Vec::new();

            let result = poller().wait_with(&runner, |d| delays.push(d));

            assert_eq!(result, Readiness::Ready { attempts: n });
            assert_eq!(runner.call_count(), n as usize);
            assert_eq!(delays.len(), (n - 1) as usize);
            assert!(delays.iter().all(|d| *d == DEFAULT_DELAY));
        }
    }

    #[test]
    fn never_ready_exhausts_thirty_probes() {
        let runner = ScriptedRunner::new().ok("probe", "0");
        let result = poller().wait_with(&runner, |_| {});
        assert_eq!(result, Readiness::NotReady { attempts: 30 });
        assert!(!result.is_ready());
        assert_eq!(runner.call_count(), 30);
    }

    #[test]
    fn probe_errors_count_as_not_ready() {
        let runner = ScriptedRunner::new().script(
            "probe",
            [Reply::fail("no such container"), Reply::ok("1")],
        );
        let result = poller().wait_with(&runner, |_| {});
        assert_eq!(result, Readiness::Ready { attempts: 2 });
    }

    #[test]
    fn fixed_wait_sleeps_once_without_probing() {
        let runner = ScriptedRunner::new();
        let poller = ReadinessPoller::new(
            ReadinessStrategy::FixedWait(Duration::from_secs(30)),
            probe(),
        );
        let mut slept = Vec::new();
        let result = poller.wait_with(&runner, |d| slept.push(d));
        assert!(result.is_ready());
        assert_eq!(slept, vec![Duration::from_secs(30)]);
        assert_eq!(runner.call_count(), 0);
    }
}
