//! Periodic cycle orchestration: scrape, diff, persist, match, notify.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    differ::ProductDiffer,
    matcher::PreferenceMatcher,
    notifier::DispatchRegistry,
    persistence::{PersistenceError, SnapshotStore, SubscriberDirectory},
    scraper::{CatalogSource, ScrapeError},
};

/// A failure while processing one locale's cycle. Absorbed and logged at
/// the cycle boundary; one locale failing never prevents the others from
/// running.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The scrape stage failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// A storage seam failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Requests an immediate cycle, bypassing the interval wait.
#[derive(Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

impl TriggerHandle {
    /// Queues a manual cycle. A trigger arriving while one is already
    /// queued coalesces with it.
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Drives the alerting pipeline on a fixed interval.
pub struct AlertScheduler {
    sources: Vec<Arc<dyn CatalogSource>>,
    differ: ProductDiffer,
    matcher: PreferenceMatcher,
    snapshots: Arc<dyn SnapshotStore>,
    subscribers: Arc<dyn SubscriberDirectory>,
    registry: Arc<DispatchRegistry>,
    cycle_interval: Duration,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

impl AlertScheduler {
    /// Creates a scheduler over the given catalog sources and seams.
    pub fn new(
        sources: Vec<Arc<dyn CatalogSource>>,
        snapshots: Arc<dyn SnapshotStore>,
        subscribers: Arc<dyn SubscriberDirectory>,
        registry: Arc<DispatchRegistry>,
        cycle_interval: Duration,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            sources,
            differ: ProductDiffer::new(),
            matcher: PreferenceMatcher::new(),
            snapshots,
            subscribers,
            registry,
            cycle_interval,
            trigger_tx,
            trigger_rx,
        }
    }

    /// A handle for requesting manual cycles while `run` is in flight.
    pub fn trigger_handle(&self) -> TriggerHandle {
        TriggerHandle { tx: self.trigger_tx.clone() }
    }

    /// Runs cycles until cancellation.
    ///
    /// The first cycle fires after one full interval. Cancellation is only
    /// observed between cycles, so an in-flight cycle always finishes its
    /// current stage instead of being killed mid-persistence.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval's immediate first tick; consumed so the first cycle
        // waits a full interval.
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.cycle_interval.as_secs(),
            locales = self.sources.len(),
            "Scheduler started."
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler shutting down.");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                Some(()) = self.trigger_rx.recv() => {
                    tracing::info!("Manual cycle triggered.");
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Runs one full cycle across all locales.
    pub async fn run_cycle(&self) {
        tracing::info!("Alert cycle started.");

        for source in &self.sources {
            let locale = source.locale();
            if let Err(e) = self.process_locale(source.as_ref()).await {
                tracing::error!(%locale, error = %e, "Cycle failed for locale.");
            }
        }

        tracing::info!("Alert cycle complete.");
    }

    async fn process_locale(&self, source: &dyn CatalogSource) -> Result<(), CycleError> {
        let locale = source.locale();

        let new_products = source.scrape().await?;
        if new_products.is_empty() {
            tracing::info!(%locale, "No products scraped.");
            return Ok(());
        }
        tracing::info!(%locale, count = new_products.len(), "Products scraped.");

        let old_products = self.snapshots.latest(locale).await?;
        let changes = self.differ.diff(&old_products, &new_products);
        tracing::info!(%locale, count = changes.len(), "Changes detected.");

        // Persist before matching: a crash past this point loses at most one
        // cycle's alerts, never the reference state for the next diff.
        self.snapshots.replace(locale, &new_products).await?;
        tracing::info!(%locale, "Snapshot persisted.");

        if changes.is_empty() {
            return Ok(());
        }

        let subscribers = self.subscribers.all_subscribers().await?;
        tracing::info!(%locale, count = subscribers.len(), "Subscribers to check.");

        for subscriber in &subscribers {
            if subscriber.preferences.region != locale {
                continue;
            }

            let alerts = self.matcher.match_changes(&changes, &subscriber.preferences, subscriber.id);
            if alerts.is_empty() {
                continue;
            }

            tracing::info!(
                subscriber_id = %subscriber.id,
                alert_count = alerts.len(),
                "Sending alerts."
            );
            for alert in &alerts {
                self.registry.notify(alert, subscriber).await;
            }
        }

        Ok(())
    }
}
