//! Periodic sitemap regeneration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::sitemap::SitemapService;

/// Handle to the background task that invalidates and rebuilds the sitemap
/// once per period. Dropping the handle leaves the task running; call
/// [`SitemapRefresher::shutdown`] to stop it.
pub struct SitemapRefresher {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl SitemapRefresher {
    pub fn spawn(service: Arc<SitemapService>, period: Duration) -> Self {
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = interval.tick() => {
                        if let Err(err) = service.refresh().await {
                            warn!(
                                target = "playshelf::sitemap::refresh",
                                error = %err,
                                "scheduled sitemap refresh failed; next request will retry"
                            );
                        }
                    }
                }
            }

            info!(target = "playshelf::sitemap::refresh", "sitemap refresher stopped");
        });

        info!(
            target = "playshelf::sitemap::refresh",
            period_secs = period.as_secs(),
            "sitemap refresher started"
        );

        Self { stop, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the loop to stop, waiting up to `grace` before aborting it.
    pub async fn shutdown(self, grace: Duration) {
        self.stop.notify_one();

        let mut handle = self.handle;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!(
                target = "playshelf::sitemap::refresh",
                grace_secs = grace.as_secs(),
                "sitemap refresher did not stop in time; aborting"
            );
            handle.abort();
            let _ = handle.await;
        }
    }
}
