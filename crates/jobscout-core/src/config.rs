use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{DescriptionFormat, Site};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// Retry budgets and backoff bounds.
///
/// Listing pages are cheap to retry; detail pages are per-item and get a
/// smaller budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub list_page_retries: u32,
    pub detail_page_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            list_page_retries: 2,
            detail_page_retries: 1,
            base_delay_ms: 250,
            max_delay_ms: 3000,
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the backoff window for a 0-indexed attempt:
    /// `min(max_delay, base_delay * 2^attempt)`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }

    /// Full-jitter delay: uniform in `[0, backoff_ceiling(attempt))`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_ceiling(attempt).mul_f64(rand::random::<f64>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Proxy URLs rotated round-robin. `localhost` means "no proxy" for that slot.
    pub proxies: Vec<String>,
    pub request_timeout_ms: u64,
    pub max_global_concurrency: usize,
    /// Per-site overrides of [`Site::default_concurrency`].
    pub max_concurrency_per_source: HashMap<Site, usize>,
    pub retry: RetryPolicy,
    pub adaptive_concurrency: bool,
    pub user_agent: Option<String>,
    pub ca_cert_path: Option<PathBuf>,
    pub default_headers: Vec<(String, String)>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            request_timeout_ms: 20_000,
            max_global_concurrency: 24,
            max_concurrency_per_source: HashMap::new(),
            retry: RetryPolicy::default(),
            adaptive_concurrency: true,
            user_agent: None,
            ca_cert_path: None,
            default_headers: Vec::new(),
        }
    }
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Configured base concurrency for a site.
    pub fn source_concurrency(&self, site: Site) -> usize {
        self.max_concurrency_per_source
            .get(&site)
            .copied()
            .unwrap_or_else(|| site.default_concurrency())
            .max(1)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.request_timeout_ms == 0 {
            return Err(AppError::Config("request_timeout_ms must be positive".into()));
        }
        if self.max_global_concurrency == 0 {
            return Err(AppError::Config(
                "max_global_concurrency must be at least 1".into(),
            ));
        }
        if let Some((site, _)) = self
            .max_concurrency_per_source
            .iter()
            .find(|(_, limit)| **limit == 0)
        {
            return Err(AppError::Config(format!(
                "max_concurrency_per_source for {site} must be at least 1"
            )));
        }
        if self.retry.base_delay_ms == 0 || self.retry.max_delay_ms == 0 {
            return Err(AppError::Config("retry delays must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SalaryFallback {
    /// Parse salaries out of descriptions for US searches only.
    #[default]
    UsOnly,
    Off,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub description_format: DescriptionFormat,
    pub annualize_salary: bool,
    pub salary_fallback: SalaryFallback,
}

/// Configuration resolved once per search; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolvedConfig {
    pub logging: LogLevel,
    pub transport: TransportSettings,
    pub output: OutputSettings,
}

impl ResolvedConfig {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: ResolvedConfig = serde_json::from_str(raw)?;
        config.transport.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentBudgetSettings {
    pub max_extra_requests_per_job: u32,
    pub max_pages_per_domain: u32,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSources {
    pub job_detail_page: bool,
    pub external_apply_page: bool,
    pub company_pages: bool,
}

/// Fields the caller opted into having filled from enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentFields {
    pub emails: bool,
    pub skills: bool,
    pub seniority: bool,
    pub company_website: bool,
    pub work_mode: bool,
    pub company_size: bool,
}

impl EnrichmentFields {
    pub fn all() -> Self {
        Self {
            emails: true,
            skills: true,
            seniority: true,
            company_website: true,
            work_mode: true,
            company_size: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub mode: EnrichmentMode,
    pub budget: EnrichmentBudgetSettings,
    pub sources: EnrichmentSources,
    pub fields: EnrichmentFields,
    pub expose_meta: bool,
}

impl EnrichmentConfig {
    /// Preset budgets and sources for a mode. `Off` disables enrichment.
    pub fn for_mode(mode: EnrichmentMode) -> Self {
        let (requests, per_domain, timeout_ms, sources) = match mode {
            EnrichmentMode::Off => return Self::default(),
            EnrichmentMode::Low => (
                1,
                1,
                3000,
                EnrichmentSources {
                    job_detail_page: true,
                    external_apply_page: true,
                    company_pages: false,
                },
            ),
            EnrichmentMode::Medium => (
                4,
                3,
                4000,
                EnrichmentSources {
                    job_detail_page: true,
                    external_apply_page: true,
                    company_pages: true,
                },
            ),
            EnrichmentMode::High => (
                8,
                4,
                6000,
                EnrichmentSources {
                    job_detail_page: true,
                    external_apply_page: true,
                    company_pages: true,
                },
            ),
        };
        Self {
            enabled: true,
            mode,
            budget: EnrichmentBudgetSettings {
                max_extra_requests_per_job: requests,
                max_pages_per_domain: per_domain,
                request_timeout_ms: timeout_ms,
            },
            sources,
            fields: EnrichmentFields::all(),
            expose_meta: false,
        }
    }

    pub fn with_meta(mut self) -> Self {
        self.expose_meta = true;
        self
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.mode != EnrichmentMode::Off
    }

    /// Per-page timeout; `None` when unset so the transport default applies.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.budget.request_timeout_ms > 0)
            .then(|| Duration::from_millis(self.budget.request_timeout_ms))
    }
}
