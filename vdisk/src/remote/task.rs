//! Remote task monitoring with a timeout budget.
//!
//! Reconfiguration requests return immediately with a task reference. The
//! monitor waits a short grace period so the platform can initialize the
//! task, then polls it at a fixed interval until it reaches a terminal
//! status or the budget runs out.
//!
//! Running out of budget abandons observation only. The remote task is
//! never cancelled and may still complete afterwards.

use core::fmt;
use core::str::FromStr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::client::{RemoteClient, RequestContext};

/// Wait before the first status check.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default total polling budget.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Queued,
    PreRunning,
    Running,
    Success,
    Error,
    Canceled,
    Aborted,
}

impl TaskStatus {
    /// Wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::PreRunning => "preRunning",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Aborted => "aborted",
        }
    }

    /// Check if the task is still in flight.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TaskStatus::Queued | TaskStatus::PreRunning | TaskStatus::Running
        )
    }

    /// Check if the task completed successfully.
    pub fn is_success(&self) -> bool {
        *self == TaskStatus::Success
    }

    /// Check if the task ended without success.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TaskStatus::Error | TaskStatus::Canceled | TaskStatus::Aborted
        )
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> core::result::Result<Self, ()> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "preRunning" => Ok(TaskStatus::PreRunning),
            "running" => Ok(TaskStatus::Running),
            "success" => Ok(TaskStatus::Success),
            "error" => Ok(TaskStatus::Error),
            "canceled" => Ok(TaskStatus::Canceled),
            "aborted" => Ok(TaskStatus::Aborted),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locator of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    /// Percent complete, when reported.
    pub progress: Option<u32>,
    pub operation: Option<String>,
    pub error_message: Option<String>,
}

/// Progress report handed to callbacks while a task is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    pub handle: TaskHandle,
    pub status: TaskStatus,
    pub percent_complete: Option<u32>,
    /// Number of status checks made so far, including this one.
    pub checks: u32,
    /// Budget left after this check's interval is spent.
    pub remaining: Duration,
}

/// How a wait ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task reported success.
    Succeeded,
    /// The budget ran out before a terminal status was seen.
    TimedOut,
    /// The caller cancelled the wait.
    Abandoned,
}

/// Timing for task waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Wait before the first status check.
    pub grace_period: Duration,
    /// Wait between status checks.
    pub poll_interval: Duration,
    /// Total polling budget.
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl MonitorConfig {
    /// Default timing with the given budget.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Waits on a submitted task.
pub struct TaskMonitor<'a> {
    client: &'a RemoteClient,
    ctx: &'a RequestContext,
    config: MonitorConfig,
    cancel: Option<CancellationToken>,
}

impl<'a> TaskMonitor<'a> {
    pub fn new(client: &'a RemoteClient, ctx: &'a RequestContext) -> Self {
        Self {
            client,
            ctx,
            config: MonitorConfig::default(),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop waiting (without touching the remote task) when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Wait for a task, discarding progress reports.
    pub async fn wait(&self, handle: &TaskHandle) -> Result<TaskOutcome> {
        self.wait_with_callback(handle, |_| {}).await
    }

    /// Wait for a task, reporting each in-flight observation to `callback`.
    ///
    /// The budget is a counter decremented by the poll interval per check,
    /// so time spent waiting on status responses is not charged to it. A
    /// check is only followed by a sleep when a full interval of budget is
    /// left; otherwise the wait times out.
    pub async fn wait_with_callback<F>(
        &self,
        handle: &TaskHandle,
        mut callback: F,
    ) -> Result<TaskOutcome>
    where
        F: FnMut(&TaskProgress) + Send,
    {
        if !self.pause(self.config.grace_period).await {
            warn!(task = %handle, "wait abandoned during grace period");
            return Ok(TaskOutcome::Abandoned);
        }

        let mut remaining = self.config.timeout;
        let mut checks = 0u32;

        while !remaining.is_zero() {
            let snapshot = self.client.task_status(handle, self.ctx).await?;
            checks += 1;
            debug!(task = %handle, status = %snapshot.status, checks, "task status");

            if snapshot.status.is_success() {
                info!(task = %handle, "task completed");
                return Ok(TaskOutcome::Succeeded);
            }
            if snapshot.status.is_failed() {
                return Err(Error::OperationFailed {
                    handle: handle.to_string(),
                    status: snapshot.status,
                    message: snapshot.error_message,
                });
            }
            if remaining < self.config.poll_interval {
                break;
            }

            remaining -= self.config.poll_interval;
            let progress = TaskProgress {
                handle: handle.clone(),
                status: snapshot.status,
                percent_complete: snapshot.progress,
                checks,
                remaining,
            };
            info!(
                task = %handle,
                status = %progress.status,
                percent = progress.percent_complete,
                remaining_secs = remaining.as_secs(),
                "waiting for task"
            );
            callback(&progress);

            if !self.pause(self.config.poll_interval).await {
                warn!(task = %handle, "wait abandoned");
                return Ok(TaskOutcome::Abandoned);
            }
        }

        warn!(
            task = %handle,
            timeout_secs = self.config.timeout.as_secs(),
            "timeout reached; task may still be running"
        );
        Ok(TaskOutcome::TimedOut)
    }

    // Returns false if the wait was cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = tokio::time::sleep(duration) => true,
                _ = token.cancelled() => false,
            },
            None => {
                tokio::time::sleep(duration).await;
                true
            }
        }
    }
}
