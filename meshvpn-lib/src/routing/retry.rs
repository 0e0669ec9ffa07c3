//! Execution of [`RouteCommand`]s with bounded exponential backoff.
//!
//! Under route table churn the darwin kernel intermittently fails the sysctl
//! behind `route` with ENOMEM (golang/go#45736). That failure, and only that
//! failure, is retried. Every other non-zero exit is returned after one attempt.

use backoff::backoff::Backoff;
use backoff::future::retry_notify;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::shell_command_ext;

use super::route_cmd::RouteCommand;
use super::route_ops::RouteCmdOps;

/// Output fragment identifying the transient kernel allocation failure.
pub const ENOMEM_OUTPUT: &str = "sysctl: cannot allocate memory";

const BACKOFF_MULTIPLIER: f64 = 2.0;

/// The one place deciding whether a failed `route` run may be retried.
pub fn is_transient_output(output: &str) -> bool {
    output.contains(ENOMEM_OUTPUT)
}

/// Backoff timings for a single route mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    /// No retry is scheduled that would end after this much time since the first attempt.
    #[serde(with = "humantime_serde")]
    pub max_elapsed_time: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("initial interval must be greater than zero")]
    ZeroInitialInterval,
    #[error("initial interval {initial:?} exceeds max interval {max:?}")]
    InitialAboveMax { initial: Duration, max: Duration },
    #[error("max elapsed time {budget:?} is shorter than the initial interval {initial:?}")]
    BudgetBelowInitial { budget: Duration, initial: Duration },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(500),
            max_elapsed_time: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.initial_interval.is_zero() {
            return Err(PolicyError::ZeroInitialInterval);
        }
        if self.initial_interval > self.max_interval {
            return Err(PolicyError::InitialAboveMax {
                initial: self.initial_interval,
                max: self.max_interval,
            });
        }
        if self.max_elapsed_time < self.initial_interval {
            return Err(PolicyError::BudgetBelowInitial {
                budget: self.max_elapsed_time,
                initial: self.initial_interval,
            });
        }
        Ok(())
    }

    fn backoff(&self) -> BudgetedBackoff {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(BACKOFF_MULTIPLIER)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();
        BudgetedBackoff {
            inner,
            started: Instant::now(),
            budget: self.max_elapsed_time,
        }
    }
}

/// Stops as soon as the next delay would overrun the elapsed time budget.
#[derive(Debug)]
struct BudgetedBackoff {
    inner: ExponentialBackoff,
    started: Instant,
    budget: Duration,
}

impl Backoff for BudgetedBackoff {
    fn reset(&mut self) {
        self.inner.reset();
        self.started = Instant::now();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.inner.next_backoff()?;
        (self.started.elapsed() + delay <= self.budget).then_some(delay)
    }
}

/// Failure of a single `route` invocation.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("kernel could not allocate memory for `{cmd}`: {output}")]
    OutOfMemory { cmd: String, output: String },
    #[error("`{cmd}` exited with status {status_code:?}: {output}")]
    Failed {
        cmd: String,
        status_code: Option<i32>,
        output: String,
    },
    #[error("unable to run `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: shell_command_ext::Error,
    },
}

impl AttemptError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptError::OutOfMemory { .. })
    }

    /// Combined output of the failed run, if the process ran at all.
    pub fn output(&self) -> Option<&str> {
        match self {
            AttemptError::OutOfMemory { output, .. } | AttemptError::Failed { output, .. } => Some(output),
            AttemptError::Spawn { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("route command retry failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: AttemptError,
    },
    #[error(transparent)]
    Permanent(AttemptError),
}

impl ExecError {
    pub fn last_attempt(&self) -> &AttemptError {
        match self {
            ExecError::RetryExhausted { source, .. } => source,
            ExecError::Permanent(err) => err,
        }
    }
}

/// Runs `cmd` until it succeeds, fails permanently or the policy's time budget is spent.
pub async fn execute<R: RouteCmdOps>(ops: &R, cmd: &RouteCommand, policy: &RetryPolicy) -> Result<(), ExecError> {
    let args = cmd.args();
    let cmd_line = cmd.to_string();
    let attempts = AtomicU32::new(0);

    let (args_ref, cmd_ref, attempts_ref) = (args.as_slice(), cmd_line.as_str(), &attempts);
    let res = retry_notify(
        policy.backoff(),
        move || async move {
            attempts_ref.fetch_add(1, Ordering::Relaxed);
            attempt(ops, args_ref, cmd_ref).await
        },
        |err: AttemptError, delay: Duration| {
            tracing::debug!(%err, ?delay, "transient route failure, retrying");
        },
    )
    .await;

    let attempts = attempts.into_inner();
    match res {
        Ok(()) => {
            tracing::debug!(cmd = %cmd_line, attempts, "route command succeeded");
            Ok(())
        }
        Err(err) if err.is_transient() => Err(ExecError::RetryExhausted { attempts, source: err }),
        Err(err) => Err(ExecError::Permanent(err)),
    }
}

async fn attempt<R: RouteCmdOps>(ops: &R, args: &[String], cmd: &str) -> Result<(), backoff::Error<AttemptError>> {
    let output = ops.run(args).await.map_err(|source| {
        backoff::Error::permanent(AttemptError::Spawn {
            cmd: cmd.to_string(),
            source,
        })
    })?;
    tracing::trace!(%cmd, output = %output.text, "route output");

    if output.success {
        return Ok(());
    }

    let text = output.text.trim().to_string();
    if is_transient_output(&text) {
        return Err(backoff::Error::transient(AttemptError::OutOfMemory {
            cmd: cmd.to_string(),
            output: text,
        }));
    }

    tracing::debug!(%cmd, status_code = ?output.status_code, output = %text, "unrecognized route failure, not retrying");
    Err(backoff::Error::permanent(AttemptError::Failed {
        cmd: cmd.to_string(),
        status_code: output.status_code,
        output: text,
    }))
}
