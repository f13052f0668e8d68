//! Upload job status polling
//!
//! After SWARFARM accepts a profile it imports it in the background and hands
//! back a job id. [`JobPoller`] asks for that job's status on a fixed interval
//! until the import succeeds, fails, or a failsafe deadline passes.
//!
//! Both timers live in the stack frame of [`JobPoller::run`]. Whichever branch
//! ends the loop, the frame returns and both are dropped together, so no timer
//! can outlive the poller or fire a second terminal transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{LiveConfig, SwarfarmConfig};
use crate::credential::Identity;
use crate::sink::Reporter;
use crate::transport::{classify, upload_job_path, ApiRequest, Transport};

/// Remote status that ends polling successfully
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// Remote statuses that end polling with a failure
pub const FAILED_STATUSES: [&str; 3] = ["FAILURE", "FAILED", "REVOKED"];

/// A profile import queued on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Read `job_id` from an upload response body
    pub fn from_response(body: Option<&Value>) -> Option<Self> {
        match body?.get("job_id")? {
            Value::String(id) if !id.is_empty() => Some(Self::new(id.clone())),
            Value::Number(id) => Some(Self::new(id.to_string())),
            _ => None,
        }
    }
}

/// Where a poller is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Polling,
    Succeeded,
    /// The server reported the import as failed
    Failed(String),
    TimedOut,
}

/// Poll interval and failsafe window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimings {
    pub interval: Duration,
    pub failsafe: Duration,
}

impl Default for PollTimings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2500),
            failsafe: Duration::from_secs(300),
        }
    }
}

impl From<&SwarfarmConfig> for PollTimings {
    fn from(config: &SwarfarmConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            failsafe: config.job_timeout(),
        }
    }
}

enum Wake {
    Shutdown,
    Failsafe,
    Tick,
    Polled(Option<JobState>),
}

/// Follows one [`UploadJob`] to a terminal state
pub struct JobPoller {
    job: UploadJob,
    identity: Identity,
    transport: Arc<dyn Transport>,
    config: LiveConfig,
    reporter: Reporter,
    timings: PollTimings,
}

impl JobPoller {
    pub fn new(
        job: UploadJob,
        identity: Identity,
        transport: Arc<dyn Transport>,
        config: LiveConfig,
        reporter: Reporter,
        timings: PollTimings,
    ) -> Self {
        Self {
            job,
            identity,
            transport,
            config,
            reporter,
            timings,
        }
    }

    pub fn job(&self) -> &UploadJob {
        &self.job
    }

    /// Poll until a terminal state is reached.
    ///
    /// If `shutdown` is cancelled first, polling stops silently and
    /// [`JobState::Polling`] is returned.
    pub async fn run(self, shutdown: CancellationToken) -> JobState {
        let failsafe = tokio::time::sleep(self.timings.failsafe);
        tokio::pin!(failsafe);

        let mut ticker = interval_at(
            Instant::now() + self.timings.interval,
            self.timings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = loop {
            let wake = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Wake::Shutdown,
                _ = &mut failsafe => Wake::Failsafe,
                _ = ticker.tick() => Wake::Tick,
            };

            // The failsafe also races an in-flight status request
            let wake = match wake {
                Wake::Tick => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => Wake::Shutdown,
                    _ = &mut failsafe => Wake::Failsafe,
                    polled = self.poll_once() => Wake::Polled(polled),
                },
                other => other,
            };

            match wake {
                Wake::Shutdown => break JobState::Polling,
                Wake::Failsafe => break JobState::TimedOut,
                Wake::Polled(Some(terminal)) => break terminal,
                Wake::Polled(None) | Wake::Tick => {}
            }
        };

        self.report(&state);
        state
    }

    /// One status request; `Some` only for a terminal remote status
    async fn poll_once(&self) -> Option<JobState> {
        let token = self
            .config
            .credential()
            .authorize(&self.identity, &self.reporter);
        let request = ApiRequest::get(upload_job_path(&self.job.job_id)).with_token(token);

        let outcome = classify(self.transport.send(request).await);
        let status = outcome
            .body()
            .and_then(|body| body.get("status"))
            .and_then(Value::as_str);

        match status {
            Some(STATUS_SUCCESS) => Some(JobState::Succeeded),
            Some(status) if FAILED_STATUSES.contains(&status) => {
                Some(JobState::Failed(outcome.detail()))
            }
            other => {
                tracing::debug!(
                    job_id = %self.job.job_id,
                    status = ?other,
                    http_status = ?outcome.status(),
                    "Profile import still pending"
                );
                None
            }
        }
    }

    fn report(&self, state: &JobState) {
        match state {
            JobState::Succeeded => self.reporter.success("SWARFARM profile import complete!"),
            JobState::Failed(detail) => self
                .reporter
                .error(format!("SWARFARM profile import failed: {}", detail)),
            JobState::TimedOut => self.reporter.error("Timed out retrieving import status."),
            JobState::Polling => {
                tracing::debug!(job_id = %self.job.job_id, "Stopped polling at shutdown")
            }
        }
    }
}
