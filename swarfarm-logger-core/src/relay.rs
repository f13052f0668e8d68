//! Relay context
//!
//! [`Relay`] is the one object a host keeps around. It is created when the
//! plugin is enabled, receives every `(request, response)` pair the host
//! observes, and is torn down when the host shuts down.
//!
//! Every event is dispatched on its own task and nothing is queued. A slow
//! server only means more tasks in flight.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::commands::AcceptedCommandCache;
use crate::config::LiveConfig;
use crate::dispatch::LogDispatcher;
use crate::error::Result;
use crate::event::LogEvent;
use crate::profile::ProfileUploader;
use crate::sink::{LogSink, Reporter};
use crate::transport::{HttpTransport, Transport};

/// Shared state and entry points of the integration
#[derive(Clone)]
pub struct Relay {
    config: LiveConfig,
    transport: Arc<dyn Transport>,
    cache: Arc<AcceptedCommandCache>,
    reporter: Reporter,
    dispatcher: LogDispatcher,
    uploader: Arc<ProfileUploader>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Relay {
    /// Start the relay against the configured SWARFARM server over HTTPS.
    ///
    /// Returns `Ok(None)` if the integration is disabled.
    pub async fn connect(config: LiveConfig, sink: Arc<dyn LogSink>) -> Result<Option<Self>> {
        let transport = HttpTransport::new(&config.snapshot())?;
        Ok(Self::init(config, Arc::new(transport), sink).await)
    }

    /// Start the relay on top of any transport.
    ///
    /// Returns `None`, without side effects, if the integration is disabled.
    /// A failed first fetch of the accepted command list is reported and does
    /// not prevent startup; the periodic refresh may still recover.
    pub async fn init(
        config: LiveConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn LogSink>,
    ) -> Option<Self> {
        let settings = config.snapshot();
        if !settings.enabled {
            tracing::info!("SWARFARM integration disabled");
            return None;
        }

        let reporter = Reporter::new(sink);
        let cache = Arc::new(AcceptedCommandCache::new());

        if !settings.api_key.is_configured() {
            if settings.profile_sync {
                reporter.error(
                    "An API key is required for SWARFARM profile sync and recommended for data \
                     logging. Copy it into settings from your SWARFARM Edit Profile page to \
                     enable this feature.",
                );
            } else {
                reporter.warning(
                    "You have not configured a SWARFARM API key in Settings. Logs will attempt \
                     to be associated to your SWARFARM account via in-game account ID, but this \
                     is not guaranteed to work.",
                );
            }
        }

        let relay = Self {
            dispatcher: LogDispatcher::new(transport.clone(), cache.clone(), reporter.clone()),
            uploader: Arc::new(ProfileUploader::new(
                transport.clone(),
                config.clone(),
                reporter.clone(),
            )),
            config,
            transport,
            cache,
            reporter,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            refresh_task: Arc::new(Mutex::new(None)),
        };

        if relay
            .cache
            .refresh(relay.transport.as_ref(), &relay.reporter)
            .await
            .is_err()
        {
            relay
                .reporter
                .error("Unable to retrieve accepted log types. SWARFARM logging is disabled.");
        }

        relay.start_refresh_timer(settings.command_refresh_interval());
        tracing::info!(server_url = %settings.server_url, "SWARFARM relay started");

        Some(relay)
    }

    /// The accepted command list currently in effect
    pub fn cache(&self) -> &AcceptedCommandCache {
        &self.cache
    }

    /// The host's live settings
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Handle one `(request, response)` pair from the host.
    ///
    /// Returns immediately; submission and profile upload run on their own
    /// tasks. The credential is read from the live settings right now.
    pub fn handle_event(&self, request: Value, response: Value) {
        let Some(event) = LogEvent::from_exchange(request, response) else {
            tracing::debug!("Ignoring event without a command");
            return;
        };

        let credential = self.config.credential();
        let dispatcher = self.dispatcher.clone();
        let submitted = event.clone();
        self.tasks.spawn(async move {
            dispatcher.submit(&submitted, &credential).await;
        });

        if self.config.profile_sync() && event.is_login() {
            let uploader = Arc::clone(&self.uploader);
            let shutdown = self.shutdown.clone();
            self.tasks.spawn(async move {
                uploader.sync(&event, shutdown).await;
            });
        }
    }

    /// Wait until every submission, upload and job poller in flight is done
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop the refresh timer and every job poller, then wait for all tasks
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        let refresh_task = self.refresh_task.lock().take();
        if let Some(handle) = refresh_task {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Command refresh task ended abnormally");
            }
        }

        tracing::info!("SWARFARM relay stopped");
    }

    fn start_refresh_timer(&self, every: Duration) {
        let cache = Arc::clone(&self.cache);
        let transport = Arc::clone(&self.transport);
        let reporter = self.reporter.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Command refresh timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Failures are reported by the cache and retried next tick
                        let _ = cache.refresh(transport.as_ref(), &reporter).await;
                    }
                }
            }
        });

        *self.refresh_task.lock() = Some(handle);
    }
}
