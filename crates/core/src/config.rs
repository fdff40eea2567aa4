use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `RENDIZY__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Organization the HTTP routes and scheduled jobs act on unless a
    /// request overrides it.
    #[serde(default = "default_organization_id")]
    pub organization_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub staysnet: StaysNetBootstrapConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Optional channel credentials used to seed `settings:staysnet` for the
/// default organization at startup. Stored settings always win once present.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StaysNetBootstrapConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auto_sync_enabled: bool,
}

/// Channel client and import window settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_calendar_days_ahead")]
    pub calendar_days_ahead: i64,
    #[serde(default = "default_auto_days_back")]
    pub auto_days_back: i64,
    #[serde(default = "default_auto_days_ahead")]
    pub auto_days_ahead: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default = "default_max_reservations")]
    pub max_reservations: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_api_delay_ms")]
    pub api_delay_ms: u64,
    #[serde(default = "default_window_days_back")]
    pub window_days_back: i64,
    #[serde(default = "default_window_days_ahead")]
    pub window_days_ahead: i64,
    #[serde(default = "default_import_days_ahead")]
    pub import_days_ahead: i64,
    #[serde(default = "default_import_days_back")]
    pub import_days_back: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_auto_sync_interval_secs")]
    pub auto_sync_interval_secs: u64,
    #[serde(default = "default_webhook_interval_secs")]
    pub webhook_interval_secs: u64,
}

// Default functions
fn default_organization_id() -> String {
    "00000000-0000-0000-0000-000000000000".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_page_limit() -> usize {
    20
}
fn default_max_pages() -> usize {
    500
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_calendar_days_ahead() -> i64 {
    90
}
fn default_auto_days_back() -> i64 {
    7
}
fn default_auto_days_ahead() -> i64 {
    30
}
fn default_max_reservations() -> usize {
    500
}
fn default_batch_size() -> usize {
    50
}
fn default_api_delay_ms() -> u64 {
    200
}
fn default_window_days_back() -> i64 {
    7
}
fn default_window_days_ahead() -> i64 {
    90
}
fn default_import_days_ahead() -> i64 {
    14
}
fn default_import_days_back() -> i64 {
    3
}
fn default_scheduler_enabled() -> bool {
    true
}
fn default_reconcile_interval_secs() -> u64 {
    86_400
}
fn default_auto_sync_interval_secs() -> u64 {
    3_600
}
fn default_webhook_interval_secs() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
            calendar_days_ahead: default_calendar_days_ahead(),
            auto_days_back: default_auto_days_back(),
            auto_days_ahead: default_auto_days_ahead(),
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_reservations: default_max_reservations(),
            batch_size: default_batch_size(),
            api_delay_ms: default_api_delay_ms(),
            window_days_back: default_window_days_back(),
            window_days_ahead: default_window_days_ahead(),
            import_days_ahead: default_import_days_ahead(),
            import_days_back: default_import_days_back(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            auto_sync_interval_secs: default_auto_sync_interval_secs(),
            webhook_interval_secs: default_webhook_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            organization_id: default_organization_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            staysnet: StaysNetBootstrapConfig::default(),
            sync: SyncConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl StaysNetBootstrapConfig {
    /// Both the key and the base URL are required to seed settings.
    pub fn is_complete(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.base_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("RENDIZY")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
