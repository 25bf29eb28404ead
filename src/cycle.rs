use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::alerts::AlertComposer;
use crate::config::AppConfig;
use crate::extractor::PriceExtractor;
use crate::ingest::CommandIngestor;
use crate::models::NotificationPayload;
use crate::plugins::ChatTransport;
use crate::refresh::{PriceRefresher, RefreshSummary};
use crate::store::ProductStore;
use crate::utils::error::AppError;

/// What one INGEST -> REFRESH -> COMPOSE -> DELIVER run did.
#[derive(Debug)]
pub struct CycleReport {
    pub id: Uuid,
    pub registered: usize,
    pub commands: usize,
    pub ingest_error: Option<String>,
    /// Valid commands that could not be written to the watchlist.
    pub store_failures: usize,
    pub refresh: RefreshSummary,
    pub payload: Option<NotificationPayload>,
    pub delivered: bool,
    pub delivery_error: Option<String>,
    pub duration_ms: u64,
}

impl CycleReport {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            registered: 0,
            commands: 0,
            ingest_error: None,
            store_failures: 0,
            refresh: RefreshSummary::default(),
            payload: None,
            delivered: false,
            delivery_error: None,
            duration_ms: 0,
        }
    }

    pub fn alerts(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.alerts.len())
    }

    /// Per-record extraction failures do not count against a cycle.
    pub fn is_success(&self) -> bool {
        self.ingest_error.is_none() && self.store_failures == 0 && self.delivery_error.is_none()
    }

    /// First phase failure, for summaries.
    pub fn failure(&self) -> Option<String> {
        self.ingest_error
            .clone()
            .or_else(|| {
                (self.store_failures > 0)
                    .then(|| format!("{} command(s) could not be stored", self.store_failures))
            })
            .or_else(|| self.delivery_error.clone())
    }
}

/// Sequences the phases of a cycle and keeps a failing phase from
/// stopping the ones after it.
pub struct CycleOrchestrator {
    store: ProductStore,
    transport: Arc<dyn ChatTransport>,
    ingestor: CommandIngestor,
    refresher: PriceRefresher,
    composer: AlertComposer,
    chat_id: String,
    currency: String,
    local_offset: chrono::FixedOffset,
}

impl CycleOrchestrator {
    pub fn new(
        config: &AppConfig,
        store: ProductStore,
        transport: Arc<dyn ChatTransport>,
        extractor: Arc<PriceExtractor>,
    ) -> Self {
        let ingestor = CommandIngestor::new(
            store.clone(),
            Arc::clone(&transport),
            extractor.registry().clone(),
            &config.alerts,
        );
        let refresher = PriceRefresher::new(store.clone(), extractor, config.scraper.max_concurrent_checks);

        Self {
            store,
            transport,
            ingestor,
            refresher,
            composer: AlertComposer::new(config.alerts.policy),
            chat_id: config.telegram.chat_id.clone(),
            currency: config.alerts.currency_symbol.clone(),
            local_offset: config.alerts.local_offset(),
        }
    }

    /// Runs one cycle. Only an unreadable watchlist aborts it; every other
    /// failure is logged and recorded in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", id = %id);
        self.run_phases(id).instrument(span).await
    }

    async fn run_phases(&self, id: Uuid) -> Result<CycleReport, AppError> {
        let started = Instant::now();
        let mut report = CycleReport::new(id);
        tracing::info!("Cycle started via {} / {}", self.transport.name(), self.store.backend_name());

        match self.ingestor.ingest().await {
            Ok(outcome) => {
                report.registered = outcome.registrations.len();
                report.commands = outcome.processed;
                report.store_failures = outcome.store_failures;
                tracing::info!(
                    "Ingest: {} command(s), {} registration(s), {} rejected, {} not stored",
                    outcome.processed,
                    outcome.registrations.len(),
                    outcome.rejected.len(),
                    outcome.store_failures
                );
            }
            Err(err) => {
                tracing::error!("Ingest phase failed, continuing with stored products: {}", err);
                report.ingest_error = Some(err.to_string());
            }
        }

        let records = self.store.list().await.map_err(|err| {
            tracing::error!("Could not read the watchlist, aborting cycle: {}", err);
            err
        })?;
        tracing::info!("Checking {} product(s)", records.len());

        let outcomes = self.refresher.refresh(records).await;
        report.refresh = RefreshSummary::of(&outcomes);
        tracing::info!(
            "Refresh: {} checked, {} updated, {} failed, {} paused",
            report.refresh.checked,
            report.refresh.updated,
            report.refresh.failed,
            report.refresh.paused
        );

        for record in self.composer.rearmed(&outcomes) {
            if let Err(err) = self.store.clear_alerted(&record.url).await {
                tracing::warn!("Could not clear alert marker for {}: {}", record.url, err);
            }
        }

        let now = Utc::now().with_timezone(&self.local_offset);
        if let Some(payload) = self.composer.compose(&outcomes, now) {
            tracing::info!("{} product(s) at or below target", payload.alerts.len());
            let text = payload.render_html(&self.currency);
            match self.transport.send_message(&self.chat_id, &text).await {
                Ok(()) => {
                    report.delivered = true;
                    for alert in &payload.alerts {
                        if let Some(price) = alert.record.current_price {
                            if let Err(err) = self.store.mark_alerted(&alert.record.url, price).await {
                                tracing::warn!("Could not set alert marker for {}: {}", alert.record.url, err);
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::error!("Alert delivery failed: {}", err);
                    report.delivery_error = Some(err.to_string());
                }
            }
            report.payload = Some(payload);
        } else {
            tracing::info!("No price drops this cycle");
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Cycle finished in {}ms", report.duration_ms);
        Ok(report)
    }
}
