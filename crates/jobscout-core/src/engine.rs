//! Search orchestration: fan a compiled request out to the registered
//! providers, collect every outcome, and run the merged batches through the
//! result pipeline.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{EnrichmentConfig, ResolvedConfig};
use crate::country::Country;
use crate::error::{AppError, SearchFailure, SourceExecutionError};
use crate::logging::LogControl;
use crate::models::{DescriptionFormat, JobType, NormalizedJob, Site, SourceBatch};
use crate::pipeline::{self, PipelineOptions};
use crate::traits::{ExchangeFactory, SourceProvider};
use crate::transport::Transport;

/// A validated search request as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub sites: Vec<Site>,
    pub search_term: Option<String>,
    pub google_search_term: Option<String>,
    pub location: Option<String>,
    /// Country alias; `None` means USA.
    pub country: Option<String>,
    pub distance: Option<u32>,
    pub is_remote: bool,
    pub job_type: Option<JobType>,
    pub easy_apply: Option<bool>,
    pub results_wanted: usize,
    pub offset: usize,
    pub hours_old: Option<u32>,
    pub linkedin_fetch_description: bool,
    pub linkedin_company_ids: Vec<u64>,
    pub enrichment: EnrichmentConfig,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            sites: Site::ALL.to_vec(),
            search_term: None,
            google_search_term: None,
            location: None,
            country: None,
            distance: Some(50),
            is_remote: false,
            job_type: None,
            easy_apply: None,
            results_wanted: 15,
            offset: 0,
            hours_old: None,
            linkedin_fetch_description: false,
            linkedin_company_ids: Vec::new(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

/// Per-source scraping parameters derived from the search request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperInput {
    pub search_term: Option<String>,
    pub google_search_term: Option<String>,
    pub location: Option<String>,
    pub country: &'static Country,
    pub distance: Option<u32>,
    pub is_remote: bool,
    pub job_type: Option<JobType>,
    pub easy_apply: Option<bool>,
    pub offset: usize,
    pub results_wanted: usize,
    pub hours_old: Option<u32>,
    pub description_format: DescriptionFormat,
    pub request_timeout: Duration,
    pub linkedin_fetch_description: bool,
    pub linkedin_company_ids: Vec<u64>,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub site: Site,
    pub input: ScraperInput,
}

/// Everything one search needs. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledSearchRequest {
    pub request: SearchRequest,
    pub config: ResolvedConfig,
    pub country: &'static Country,
    pub source_requests: Vec<SourceRequest>,
}

impl CompiledSearchRequest {
    /// Resolves the country and derives one source request per distinct site,
    /// in the order the sites were requested.
    pub fn compile(request: SearchRequest, config: ResolvedConfig) -> Result<Self, AppError> {
        if request.sites.is_empty() {
            return Err(AppError::Validation("at least one site is required".into()));
        }
        config.transport.validate()?;

        let country = match request.country.as_deref() {
            Some(alias) => Country::from_alias(alias)
                .ok_or_else(|| AppError::Validation(format!("unknown country: {alias}")))?,
            None => Country::usa(),
        };

        let input = ScraperInput {
            search_term: request.search_term.clone(),
            google_search_term: request.google_search_term.clone(),
            location: request.location.clone(),
            country,
            distance: request.distance,
            is_remote: request.is_remote,
            job_type: request.job_type,
            easy_apply: request.easy_apply,
            offset: request.offset,
            results_wanted: request.results_wanted,
            hours_old: request.hours_old,
            description_format: config.output.description_format,
            request_timeout: config.transport.request_timeout(),
            linkedin_fetch_description: request.linkedin_fetch_description,
            linkedin_company_ids: request.linkedin_company_ids.clone(),
            enrichment: request.enrichment.clone(),
        };

        let mut source_requests: Vec<SourceRequest> = Vec::new();
        for site in &request.sites {
            if source_requests.iter().all(|existing| existing.site != *site) {
                source_requests.push(SourceRequest {
                    site: *site,
                    input: input.clone(),
                });
            }
        }

        Ok(Self {
            request,
            config,
            country,
            source_requests,
        })
    }
}

/// What a provider gets for the duration of one `search` call.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub transport: &'a Transport,
    pub config: &'a ResolvedConfig,
}

/// Explicit site-to-provider table, built by the caller at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Site, Arc<dyn SourceProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("sites", &self.sites())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own site, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn SourceProvider>) -> &mut Self {
        self.providers.insert(provider.site(), provider);
        self
    }

    pub fn with(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, site: Site) -> Option<&Arc<dyn SourceProvider>> {
        self.providers.get(&site)
    }

    pub fn sites(&self) -> Vec<Site> {
        let mut sites: Vec<Site> = self.providers.keys().copied().collect();
        sites.sort();
        sites
    }
}

/// What to do when some sources fail and others succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed source fails the whole search.
    #[default]
    Strict,
    /// Log failed sources and return what the others produced.
    BestEffort,
}

/// Runs searches. Owns the transport lifecycle of every search it executes.
pub struct SearchEngine<F: ExchangeFactory> {
    factory: F,
    log_control: Option<LogControl>,
    failure_policy: FailurePolicy,
}

impl<F: ExchangeFactory> SearchEngine<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            log_control: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Lets each search apply its configured log level.
    pub fn with_log_control(mut self, control: LogControl) -> Self {
        self.log_control = Some(control);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub async fn execute(
        &self,
        compiled: &CompiledSearchRequest,
        providers: &ProviderRegistry,
    ) -> Result<Vec<NormalizedJob>, AppError> {
        if let Some(control) = &self.log_control
            && let Err(e) = control.apply(compiled.config.logging)
        {
            tracing::warn!(error = %e, "Could not apply log level");
        }

        let search_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "search",
            %search_id,
            sources = compiled.source_requests.len()
        );
        self.run(compiled, providers).instrument(span).await
    }

    async fn run(
        &self,
        compiled: &CompiledSearchRequest,
        providers: &ProviderRegistry,
    ) -> Result<Vec<NormalizedJob>, AppError> {
        let exchange = self.factory.create(&compiled.config.transport)?;
        let transport = Transport::new(&compiled.config.transport, exchange);
        let ctx = SearchContext {
            transport: &transport,
            config: &compiled.config,
        };

        let outcomes = join_all(
            compiled
                .source_requests
                .iter()
                .map(|request| run_source(request, providers, ctx)),
        )
        .await;

        transport.close().await;

        let mut batches = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(batch) => batches.push(batch),
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            match self.failure_policy {
                FailurePolicy::Strict => {
                    tracing::error!(failed = failures.len(), "Search failed");
                    return Err(SearchFailure { failures }.into());
                }
                FailurePolicy::BestEffort => {
                    for failure in &failures {
                        tracing::warn!(site = %failure.site, error = %failure, "Dropping failed source");
                    }
                }
            }
        }

        let jobs = pipeline::run(
            batches,
            &PipelineOptions {
                country: compiled.country,
                annualize_salary: compiled.config.output.annualize_salary,
                salary_fallback: compiled.config.output.salary_fallback,
            },
        );
        tracing::info!(results = jobs.len(), "Search completed");
        Ok(jobs)
    }
}

async fn run_source(
    request: &SourceRequest,
    providers: &ProviderRegistry,
    ctx: SearchContext<'_>,
) -> Result<SourceBatch, SourceExecutionError> {
    let site = request.site;
    let Some(provider) = providers.get(site) else {
        return Err(SourceExecutionError::new(
            site,
            "No provider registered for site.",
        ));
    };

    let outcome = AssertUnwindSafe(provider.search(request, &ctx))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(jobs)) => {
            tracing::info!(site = %site, jobs = jobs.len(), "Source finished scraping");
            Ok(SourceBatch { site, jobs })
        }
        Ok(Err(e)) => {
            tracing::warn!(site = %site, error = %e, "Source failed");
            Err(SourceExecutionError::with_cause(
                site,
                "Site scrape failed.",
                e,
            ))
        }
        Err(_) => {
            tracing::error!(site = %site, "Source panicked");
            Err(SourceExecutionError::new(site, "Site scrape panicked."))
        }
    }
}
