//! Entry point for every Stays.net job.
//!
//! The service loads `settings:staysnet` for the organization, rejects the
//! call when the integration is not configured, takes the organization's run
//! lock and builds a channel client from the shared provider.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rendizy_core::config::{AppConfig, StaysNetBootstrapConfig};
use rendizy_core::reconciliation::{ReconciliationItem, ReconciliationRun};
use rendizy_core::stats::{
    CalendarOutcome, ImportMissingOutcome, OwnersOutcome, SyncOutcome, WebhookStats,
};
use rendizy_core::types::{StaysNetSettings, WebhookEvent};
use rendizy_core::{SyncError, SyncResult};
use rendizy_staysnet::{ChannelClient, ChannelProvider};
use rendizy_store::SyncStore;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calendar::{run_calendar_sync, CalendarSyncRequest};
use crate::full_sync::{run_full_sync, FullSyncRequest};
use crate::guard::RunGuard;
use crate::import_missing::{run_import_missing, ImportMissingOptions};
use crate::owners::run_owners_sync;
use crate::reconcile::{run_reconciliation, ReconcileOptions};
use crate::webhooks::{run_webhook_processing, webhook_limit};

pub const NOT_CONFIGURED: &str = "Stays.net não configurado";
pub const INCOMPLETE_SETTINGS: &str = "Configuração Stays.net incompleta (apiKey e baseUrl são obrigatórios)";
pub const DISABLED: &str = "Integração Stays.net desativada";

/// Result of `auto` sync: a recent-window full import followed by calendar.
#[derive(Debug, Clone)]
pub struct AutoSyncOutcome {
    pub success: bool,
    pub reservations: SyncOutcome,
    pub calendar: CalendarOutcome,
}

pub struct StaysNetSyncService {
    store: Arc<dyn SyncStore>,
    provider: Arc<dyn ChannelProvider>,
    config: AppConfig,
    guard: RunGuard,
}

impl StaysNetSyncService {
    pub fn new(store: Arc<dyn SyncStore>, provider: Arc<dyn ChannelProvider>, config: AppConfig) -> Self {
        Self {
            store,
            provider,
            config,
            guard: RunGuard::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn guard(&self) -> &RunGuard {
        &self.guard
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub async fn settings(&self, organization_id: &str) -> SyncResult<Option<StaysNetSettings>> {
        self.store.get_settings(organization_id).await
    }

    /// Store new settings, keeping the recorded `lastSync`.
    pub async fn save_settings(
        &self,
        organization_id: &str,
        mut settings: StaysNetSettings,
    ) -> SyncResult<StaysNetSettings> {
        settings.base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        settings.api_key = settings.api_key.trim().to_string();
        if settings.enabled {
            validate(&settings)?;
        }
        if let Some(current) = self.store.get_settings(organization_id).await? {
            settings.last_sync = settings.last_sync.or(current.last_sync);
        }
        self.store.save_settings(organization_id, &settings).await?;
        info!(organization_id = %organization_id, enabled = settings.enabled, "Stays.net settings saved");
        Ok(settings)
    }

    /// Write bootstrap credentials when the organization has no settings yet.
    pub async fn seed_settings(
        &self,
        organization_id: &str,
        bootstrap: &StaysNetBootstrapConfig,
    ) -> SyncResult<bool> {
        if !bootstrap.is_complete() || self.store.get_settings(organization_id).await?.is_some() {
            return Ok(false);
        }
        let settings = StaysNetSettings {
            api_key: bootstrap.api_key.clone().unwrap_or_default(),
            api_secret: bootstrap.api_secret.clone(),
            base_url: bootstrap.base_url.clone().unwrap_or_default(),
            enabled: true,
            auto_sync_enabled: Some(bootstrap.auto_sync_enabled),
            last_sync: None,
        };
        self.save_settings(organization_id, settings).await?;
        info!(organization_id = %organization_id, "Stays.net settings seeded from configuration");
        Ok(true)
    }

    pub async fn auto_sync_enabled(&self, organization_id: &str) -> bool {
        match self.store.get_settings(organization_id).await {
            Ok(Some(settings)) => settings.auto_sync(),
            Ok(None) => false,
            Err(e) => {
                warn!(organization_id = %organization_id, error = %e, "failed to read settings");
                false
            }
        }
    }

    async fn channel(&self, organization_id: &str) -> SyncResult<(StaysNetSettings, Arc<dyn ChannelClient>)> {
        let settings = self
            .store
            .get_settings(organization_id)
            .await?
            .ok_or_else(|| SyncError::Config(NOT_CONFIGURED.to_string()))?;
        validate(&settings)?;
        if !settings.enabled {
            return Err(SyncError::Config(DISABLED.to_string()));
        }
        let client = self.provider.client(&settings)?;
        Ok((settings, client))
    }

    async fn record_last_sync(&self, organization_id: &str, mut settings: StaysNetSettings) {
        settings.last_sync = Some(Utc::now());
        if let Err(e) = self.store.save_settings(organization_id, &settings).await {
            warn!(organization_id = %organization_id, error = %e, "failed to record lastSync");
        }
    }

    // ─── Jobs ───────────────────────────────────────────────────────────────

    pub async fn full_sync(&self, organization_id: &str, request: &FullSyncRequest) -> SyncResult<SyncOutcome> {
        let _permit = self.guard.acquire(organization_id, "full_sync")?;
        let (settings, client) = self.channel(organization_id).await?;
        let outcome = run_full_sync(client.as_ref(), self.store.as_ref(), organization_id, request).await;
        if outcome.success {
            self.record_last_sync(organization_id, settings).await;
        }
        Ok(outcome)
    }

    pub async fn calendar_sync(&self, organization_id: &str, request: &CalendarSyncRequest) -> SyncResult<CalendarOutcome> {
        let _permit = self.guard.acquire(organization_id, "calendar_sync")?;
        let (_, client) = self.channel(organization_id).await?;
        Ok(run_calendar_sync(
            client.as_ref(),
            self.store.as_ref(),
            organization_id,
            request,
            self.config.sync.calendar_days_ahead,
        )
        .await)
    }

    pub async fn owners_sync(&self, organization_id: &str) -> SyncResult<OwnersOutcome> {
        let _permit = self.guard.acquire(organization_id, "owners_sync")?;
        let (_, client) = self.channel(organization_id).await?;
        Ok(run_owners_sync(client.as_ref(), self.store.as_ref(), organization_id).await)
    }

    /// Recent-window full import followed by a default calendar sync.
    pub async fn auto_sync(&self, organization_id: &str) -> SyncResult<AutoSyncOutcome> {
        let _permit = self.guard.acquire(organization_id, "auto_sync")?;
        let (settings, client) = self.channel(organization_id).await?;

        let today = Utc::now().date_naive();
        let request = FullSyncRequest::window(
            today - Duration::days(self.config.sync.auto_days_back),
            today + Duration::days(self.config.sync.auto_days_ahead),
        );
        let reservations = run_full_sync(client.as_ref(), self.store.as_ref(), organization_id, &request).await;
        let calendar = run_calendar_sync(
            client.as_ref(),
            self.store.as_ref(),
            organization_id,
            &CalendarSyncRequest::default(),
            self.config.sync.calendar_days_ahead,
        )
        .await;

        let success = reservations.success && calendar.success;
        if success {
            self.record_last_sync(organization_id, settings).await;
        }
        Ok(AutoSyncOutcome {
            success,
            reservations,
            calendar,
        })
    }

    pub async fn reconcile(
        &self,
        organization_id: &str,
        dry_run: bool,
        limit: Option<usize>,
    ) -> SyncResult<ReconciliationRun> {
        let _permit = self.guard.acquire(organization_id, "reconcile")?;
        let (_, client) = self.channel(organization_id).await?;
        let options = ReconcileOptions::from_config(&self.config.reconciliation)
            .with_dry_run(dry_run)
            .with_limit(limit);
        run_reconciliation(client.as_ref(), self.store.as_ref(), organization_id, &options).await
    }

    pub async fn import_missing(
        &self,
        organization_id: &str,
        days_ahead: Option<i64>,
        days_back: Option<i64>,
    ) -> SyncResult<ImportMissingOutcome> {
        let _permit = self.guard.acquire(organization_id, "import_missing")?;
        let (_, client) = self.channel(organization_id).await?;
        let options = ImportMissingOptions::from_config(&self.config.reconciliation)
            .with_overrides(days_ahead, days_back);
        Ok(run_import_missing(client.as_ref(), self.store.as_ref(), organization_id, &options).await)
    }

    // ─── Webhooks ───────────────────────────────────────────────────────────

    /// Queue a raw notification. Storing needs no channel access, so this
    /// works even while the integration is disabled.
    pub async fn receive_webhook(&self, organization_id: &str, body: Value) -> SyncResult<WebhookEvent> {
        let event = WebhookEvent::received(organization_id, body);
        self.store.insert_webhook(&event).await?;
        metrics::counter!("staysnet.webhooks.received").increment(1);
        info!(
            organization_id = %organization_id,
            webhook_id = %event.id,
            action = %event.action,
            "Stays.net webhook queued"
        );
        Ok(event)
    }

    pub async fn process_webhooks(&self, organization_id: &str, limit: Option<usize>) -> SyncResult<WebhookStats> {
        let _permit = self.guard.acquire(organization_id, "webhooks")?;
        if self.store.list_pending_webhooks(organization_id, 1).await?.is_empty() {
            return Ok(WebhookStats::default());
        }
        let (_, client) = self.channel(organization_id).await?;
        run_webhook_processing(client.as_ref(), self.store.as_ref(), organization_id, webhook_limit(limit)).await
    }

    /// Check candidate credentials against the channel; they need not be saved.
    pub async fn test_connection(&self, settings: &StaysNetSettings) -> SyncResult<Value> {
        validate(settings)?;
        let client = self.provider.client(settings)?;
        let response = client.test_connection().await;
        if !response.success {
            return Err(SyncError::Channel(response.error_message()));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }

    // ─── Run history ────────────────────────────────────────────────────────

    pub async fn list_runs(&self, organization_id: &str, limit: usize) -> SyncResult<Vec<ReconciliationRun>> {
        self.store.list_runs(organization_id, limit).await
    }

    pub async fn run_items(&self, organization_id: &str, run_id: Uuid) -> SyncResult<Vec<ReconciliationItem>> {
        if self.store.get_run(organization_id, run_id).await?.is_none() {
            return Err(SyncError::NotFound(format!("reconciliation run {}", run_id)));
        }
        self.store.list_items(run_id).await
    }
}

fn validate(settings: &StaysNetSettings) -> SyncResult<()> {
    if settings.api_key.trim().is_empty() || settings.base_url.trim().is_empty() {
        return Err(SyncError::Config(INCOMPLETE_SETTINGS.to_string()));
    }
    Ok(())
}
