//! Profile upload
//!
//! On login the game's response is the full account snapshot. With profile
//! sync enabled it is posted to `profiles/upload/`; an accepted upload hands
//! back a job id that a [`JobPoller`] follows until the import finishes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::LiveConfig;
use crate::event::LogEvent;
use crate::poller::{JobPoller, JobState, PollTimings, UploadJob};
use crate::sink::{Reporter, PLUGIN_NAME};
use crate::transport::{body_text, classify, ApiRequest, Outcome, Transport, PROFILE_UPLOAD};

pub struct ProfileUploader {
    transport: Arc<dyn Transport>,
    config: LiveConfig,
    reporter: Reporter,
}

impl ProfileUploader {
    pub fn new(transport: Arc<dyn Transport>, config: LiveConfig, reporter: Reporter) -> Self {
        Self {
            transport,
            config,
            reporter,
        }
    }

    /// Upload the profile carried by a login event and follow the import.
    ///
    /// Returns the poller's final state, or `None` if no job was queued.
    pub async fn sync(&self, event: &LogEvent, shutdown: CancellationToken) -> Option<JobState> {
        let poller = self.upload(event).await?;
        Some(poller.run(shutdown).await)
    }

    /// Post the profile. Returns a poller for the queued import job.
    ///
    /// Every rejection is terminal: it is reported and nothing is retried.
    pub async fn upload(&self, event: &LogEvent) -> Option<JobPoller> {
        if !event.is_login() {
            return None;
        }

        let config = self.config.snapshot();
        if !config.api_key.is_configured() {
            self.reporter.error(format!(
                "Profile upload is enabled, but missing API key. Check {} settings.",
                PLUGIN_NAME
            ));
            return None;
        }

        self.reporter.info("Uploading profile to SWARFARM...");

        let identity = event.profile_identity();
        let token = config.api_key.authorize(&identity, &self.reporter);
        let request = ApiRequest::post(PROFILE_UPLOAD, event.response().clone()).with_token(token);

        let outcome = classify(self.transport.send(request).await);
        match outcome {
            Outcome::Success(body) => {
                self.reporter
                    .debug("SWARFARM profile successfully uploaded - awaiting import queue.");

                let Some(job) = UploadJob::from_response(body.as_ref()) else {
                    self.reporter.error(
                        "SWARFARM accepted the profile upload but returned no job id to follow.",
                    );
                    return None;
                };
                tracing::debug!(job_id = %job.job_id, identity = %identity, "Profile import queued");

                Some(JobPoller::new(
                    job,
                    identity,
                    Arc::clone(&self.transport),
                    self.config.clone(),
                    self.reporter.clone(),
                    PollTimings::from(&config),
                ))
            }
            Outcome::ValidationFailed(body) => {
                self.reporter.error(format!(
                    "There were errors importing your SWARFARM profile: {}",
                    body_text(body.as_ref())
                ));
                None
            }
            Outcome::Unauthorized(_) => {
                self.reporter
                    .error("Unable to authenticate to SWARFARM. Check your API key in settings.");
                None
            }
            Outcome::Conflict(body) => {
                self.reporter.error(format!(
                    "{}. You must manually upload your profile on SWARFARM to resolve this.",
                    body_text(body.as_ref())
                ));
                None
            }
            Outcome::TransportFailed(message) => {
                self.reporter.error(format!("Error: {}", message));
                None
            }
            Outcome::UnexpectedStatus { status, body } => {
                self.reporter.error(format!(
                    "Unexpected response {} while uploading SWARFARM profile: {}",
                    status,
                    body_text(body.as_ref())
                ));
                None
            }
        }
    }
}
