//! Job lifecycle: the capability contract every workflow implements and the
//! bounded whole-job restart loop that drives it.
//!
//! # States
//!
//! ```text
//! Configuring ──> EnvironmentReady ──> Running ──> Completed
//!      ^                                  │
//!      │                                  v
//!      └────────── restart ───────── FailedRecoverable ──> FailedFatal
//! ```
//!
//! A failure in any of `configure`, `prepare_environment` or `start_job`
//! lands in `FailedRecoverable`. [`Bot::handle_failure`] bumps the error
//! counter and decides: below the retry ceiling the whole job re-enters
//! `Configuring` after its resources are released; at the ceiling it becomes
//! `FailedFatal`, partial output is flushed and the error is returned.
//!
//! The restart is an explicit loop, so the attempt count never grows the
//! call stack.

use crate::counter::Counter;
use crate::errors::{BotError, Result};
use crate::models::JobStatus;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Configuring,
    EnvironmentReady,
    Running,
    Completed,
    FailedRecoverable,
    FailedFatal,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Restart,
    Fatal,
}

impl Recovery {
    /// Restart while the error count is below the ceiling.
    ///
    /// Invalid configuration is fatal at once: re-reading the same values
    /// cannot succeed.
    pub fn decide(error: &BotError, error_count: usize, ceiling: usize) -> Self {
        if matches!(error, BotError::Config(_)) || error_count >= ceiling.max(1) {
            Recovery::Fatal
        } else {
            Recovery::Restart
        }
    }
}

/// Record and error tallies for one job, plus the status-based completion
/// handler.
#[derive(Debug, Default)]
pub struct Tally {
    records: Counter,
    errors: Counter,
}

impl Tally {
    pub fn new() -> Self {
        Tally {
            records: Counter::new(),
            errors: Counter::new(),
        }
    }

    pub fn records(&self) -> usize {
        self.records.value()
    }

    pub fn errors(&self) -> usize {
        self.errors.value()
    }

    /// Count one failure and return the new error count.
    pub fn fail(&mut self) -> usize {
        self.errors.increment()
    }

    /// Complete one unit of work with `status`.
    ///
    /// | Status | Counter | `finalize` |
    /// |--------|---------|------------|
    /// | `Success` | records, after `finalize` succeeds | runs |
    /// | `BusinessError` | errors | runs |
    /// | `SystemError` | errors | skipped |
    /// | `Unknown` | none | skipped |
    pub fn complete<F>(&mut self, status: JobStatus, finalize: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        match status {
            JobStatus::Success => {
                finalize()?;
                self.records.increment();
            }
            JobStatus::BusinessError => {
                self.errors.increment();
                finalize()?;
            }
            JobStatus::SystemError => {
                self.errors.increment();
            }
            JobStatus::Unknown => {
                warn!(%status, "Unknown completion status; nothing finalized");
            }
        }
        Ok(())
    }
}

/// Final outcome of a completed [`Bot::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub state: JobState,
    pub records: usize,
    pub attempts: usize,
}

fn enter(state: &mut JobState, next: JobState) {
    info!(from = %state, to = %next, "Job state changed");
    *state = next;
}

/// A workflow the lifecycle can drive.
///
/// Implementors provide the steps; [`Bot::run`] and [`Bot::handle_failure`]
/// are provided and should not need overriding.
pub trait Bot {
    /// Read and validate configuration.
    fn configure(&mut self) -> Result<()>;

    /// Acquire output directories, the sink and the browsing session.
    fn prepare_environment(&mut self) -> Result<()>;

    /// The single pass: search, sort, crawl.
    fn start_job(&mut self) -> Result<()>;

    /// Flush and release resources after a successful pass; returns the
    /// number of records captured.
    fn finish_job(&mut self) -> Result<usize>;

    /// Flush and release whatever is held after the last failed attempt.
    fn finish_job_with_error(&mut self, attempts: usize, error: &BotError);

    /// Flush and release resources before a whole-job restart.
    fn release(&mut self) -> Result<()>;

    /// Raise the job's stop flag; no further work is claimed, including
    /// after a whole-job restart.
    fn stop(&mut self);

    /// Maximum failed attempts before the job becomes fatal.
    fn retry_ceiling(&self) -> usize;

    fn tally(&mut self) -> &mut Tally;

    /// Count a failed attempt and decide whether to restart.
    fn handle_failure(&mut self, error: &BotError) -> Recovery {
        let ceiling = self.retry_ceiling();
        let count = self.tally().fail();
        error!(error = %error, error_count = count, ceiling, "Job attempt failed");
        Recovery::decide(error, count, ceiling)
    }

    /// Drive the job to `Completed` or `FailedFatal`.
    fn run(&mut self) -> Result<JobReport> {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let mut state = JobState::Configuring;
            info!(attempt = attempts, "Starting job attempt");

            let outcome = self
                .configure()
                .and_then(|()| self.prepare_environment())
                .and_then(|()| {
                    enter(&mut state, JobState::EnvironmentReady);
                    enter(&mut state, JobState::Running);
                    self.start_job()
                });

            let error = match outcome {
                Ok(()) => {
                    let records = self.finish_job()?;
                    enter(&mut state, JobState::Completed);
                    info!(records, attempts, "Job completed");
                    return Ok(JobReport {
                        state,
                        records,
                        attempts,
                    });
                }
                Err(e) => e,
            };

            enter(&mut state, JobState::FailedRecoverable);
            match self.handle_failure(&error) {
                Recovery::Restart => {
                    if let Err(e) = self.release() {
                        warn!(error = %e, "Failed to release resources before restart");
                    }
                    info!(attempt = attempts, "Restarting whole job");
                }
                Recovery::Fatal => {
                    enter(&mut state, JobState::FailedFatal);
                    self.finish_job_with_error(attempts, &error);
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_finalizes_then_counts_record() {
        let mut tally = Tally::new();
        let mut ran = false;
        tally
            .complete(JobStatus::Success, || {
                ran = true;
                Ok(())
            })
            .unwrap();
        assert!(ran);
        assert_eq!((tally.records(), tally.errors()), (1, 0));
    }

    #[test]
    fn test_failed_finalize_does_not_count_success() {
        let mut tally = Tally::new();
        let result = tally.complete(JobStatus::Success, || Err(BotError::Sink("locked".into())));
        assert!(result.is_err());
        assert_eq!(tally.records(), 0);
    }

    #[test]
    fn test_business_error_counts_and_finalizes() {
        let mut tally = Tally::new();
        let mut ran = false;
        tally
            .complete(JobStatus::BusinessError, || {
                ran = true;
                Ok(())
            })
            .unwrap();
        assert!(ran);
        assert_eq!((tally.records(), tally.errors()), (0, 1));
    }

    #[test]
    fn test_system_error_counts_without_finalizing() {
        let mut tally = Tally::new();
        tally
            .complete(JobStatus::SystemError, || panic!("must not finalize"))
            .unwrap();
        assert_eq!((tally.records(), tally.errors()), (0, 1));
    }

    #[test]
    fn test_unknown_touches_nothing() {
        let mut tally = Tally::new();
        tally
            .complete(JobStatus::Unknown, || panic!("must not finalize"))
            .unwrap();
        assert_eq!((tally.records(), tally.errors()), (0, 0));
    }

    #[test]
    fn test_recovery_decision() {
        let e = BotError::Search("icon".into());
        assert_eq!(Recovery::decide(&e, 1, 3), Recovery::Restart);
        assert_eq!(Recovery::decide(&e, 3, 3), Recovery::Fatal);
        let cfg = BotError::Config("empty query".into());
        assert_eq!(Recovery::decide(&cfg, 1, 3), Recovery::Fatal);
    }

    /// Fails `start_job` for the first `failures` attempts.
    #[derive(Default)]
    struct ScriptedBot {
        failures: usize,
        env_failures: usize,
        ceiling: usize,
        tally: Tally,
        calls: Vec<&'static str>,
    }

    impl Bot for ScriptedBot {
        fn configure(&mut self) -> Result<()> {
            self.calls.push("configure");
            Ok(())
        }

        fn prepare_environment(&mut self) -> Result<()> {
            self.calls.push("prepare");
            if self.env_failures > 0 {
                self.env_failures -= 1;
                return Err(BotError::Environment("no chrome".into()));
            }
            Ok(())
        }

        fn start_job(&mut self) -> Result<()> {
            self.calls.push("start");
            if self.failures > 0 {
                self.failures -= 1;
                return Err(BotError::Sort("select".into()));
            }
            self.tally.complete(JobStatus::Success, || Ok(()))
        }

        fn finish_job(&mut self) -> Result<usize> {
            self.calls.push("finish");
            Ok(self.tally.records())
        }

        fn finish_job_with_error(&mut self, _attempts: usize, _error: &BotError) {
            self.calls.push("finish_with_error");
        }

        fn release(&mut self) -> Result<()> {
            self.calls.push("release");
            Ok(())
        }

        fn stop(&mut self) {}

        fn retry_ceiling(&self) -> usize {
            self.ceiling
        }

        fn tally(&mut self) -> &mut Tally {
            &mut self.tally
        }
    }

    #[test]
    fn test_run_completes_first_time() {
        let mut bot = ScriptedBot {
            ceiling: 3,
            ..Default::default()
        };
        let report = bot.run().unwrap();
        assert_eq!(report.state, JobState::Completed);
        assert_eq!((report.records, report.attempts), (1, 1));
        assert_eq!(bot.calls, vec!["configure", "prepare", "start", "finish"]);
    }

    #[test]
    fn test_run_restarts_whole_job_below_ceiling() {
        let mut bot = ScriptedBot {
            failures: 2,
            ceiling: 3,
            ..Default::default()
        };
        let report = bot.run().unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(bot.tally.errors(), 2);
        assert_eq!(bot.calls.iter().filter(|c| **c == "configure").count(), 3);
        assert_eq!(bot.calls.iter().filter(|c| **c == "release").count(), 2);
    }

    #[test]
    fn test_run_becomes_fatal_at_ceiling() {
        let mut bot = ScriptedBot {
            failures: usize::MAX,
            ceiling: 3,
            ..Default::default()
        };
        let err = bot.run().unwrap_err();
        assert!(matches!(err, BotError::Sort(_)));
        assert_eq!(bot.tally.errors(), 3);
        assert_eq!(bot.calls.last(), Some(&"finish_with_error"));
        assert!(!bot.calls.contains(&"finish"));
    }

    #[test]
    fn test_environment_failure_never_reaches_start() {
        let mut bot = ScriptedBot {
            env_failures: 1,
            ceiling: 3,
            ..Default::default()
        };
        let report = bot.run().unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(
            bot.calls,
            vec!["configure", "prepare", "release", "configure", "prepare", "start", "finish"]
        );
    }
}
