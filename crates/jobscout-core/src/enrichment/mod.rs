//! Best-effort enrichment of job postings from auxiliary pages.
//!
//! For each job, a [`BudgetController`] caps the extra requests, the
//! [`DocumentCollector`] fetches the enabled pages through the search's
//! transport, and the extractors derive optional fields with a confidence
//! tag. Nothing here can fail a job: on any problem the job is returned as
//! the source produced it.

pub mod budget;
pub mod collector;
pub mod extractors;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

pub use budget::{BudgetController, BudgetUsage};
pub use collector::{CollectTargets, DocumentCollector};

use crate::config::{EnrichmentConfig, EnrichmentFields};
use crate::error::AppError;
use crate::models::{JobPost, Site};
use crate::traits::Cleaner;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentSource {
    JobDetailPage,
    ExternalApplyPage,
    CompanyPages,
}

/// One fetched page, reduced to text.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentDocument {
    pub source: DocumentSource,
    pub url: String,
    pub domain: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrichmentField {
    Emails,
    Skills,
    Seniority,
    CompanyWebsite,
    WorkMode,
    CompanySize,
}

impl EnrichmentField {
    pub fn is_enabled(&self, fields: &EnrichmentFields) -> bool {
        match self {
            EnrichmentField::Emails => fields.emails,
            EnrichmentField::Skills => fields.skills,
            EnrichmentField::Seniority => fields.seniority,
            EnrichmentField::CompanyWebsite => fields.company_website,
            EnrichmentField::WorkMode => fields.work_mode,
            EnrichmentField::CompanySize => fields.company_size,
        }
    }
}

/// Values derived from the collected documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentExtraction {
    pub emails: Option<Vec<String>>,
    pub skills: Option<Vec<String>>,
    pub seniority: Option<String>,
    pub company_website: Option<String>,
    pub work_mode: Option<String>,
    pub company_size: Option<String>,
    pub field_confidence: BTreeMap<EnrichmentField, Confidence>,
}

/// Attached to a job only when the caller asks for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentMeta {
    pub enabled: bool,
    pub sources_used: Vec<DocumentSource>,
    pub budget_used: BudgetUsage,
    pub field_confidence: BTreeMap<EnrichmentField, Confidence>,
}

/// Company pages already fetched during this search, keyed by domain.
pub type CompanyPageCache = moka::future::Cache<String, Arc<Vec<EnrichmentDocument>>>;

pub fn new_company_page_cache() -> CompanyPageCache {
    moka::future::Cache::builder().max_capacity(1_024).build()
}

/// Lowercased host of an absolute URL.
pub fn url_domain(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.trim().to_lowercase();
    (!host.is_empty()).then_some(host)
}

/// Enriches the jobs of one source during one search.
pub struct Enricher<C: Cleaner> {
    site: Site,
    config: EnrichmentConfig,
    cleaner: C,
    user_agent: Option<String>,
    company_pages: CompanyPageCache,
}

impl<C: Cleaner> Enricher<C> {
    pub fn new(site: Site, config: EnrichmentConfig, cleaner: C) -> Self {
        Self {
            site,
            config,
            cleaner,
            user_agent: None,
            company_pages: new_company_page_cache(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Returns `job` with enrichment applied, or unchanged when enrichment is
    /// off or anything goes wrong.
    ///
    /// `detail` is the job's detail page if the source already fetched it;
    /// otherwise it is fetched here when the detail-page source is enabled.
    pub async fn enrich(
        &self,
        job: JobPost,
        detail: Option<EnrichmentDocument>,
        transport: &Transport,
    ) -> JobPost {
        if !self.config.is_active() {
            return job;
        }

        let outcome = AssertUnwindSafe(self.enrich_job(job.clone(), detail, transport))
            .catch_unwind()
            .await;
        match outcome {
            Ok(enriched) => enriched,
            Err(_) => {
                let err = AppError::Enrichment(format!("panicked while enriching {}", job.job_url));
                tracing::warn!(site = %self.site, error = %err, "Returning job without enrichment");
                job
            }
        }
    }

    async fn enrich_job(
        &self,
        mut job: JobPost,
        detail: Option<EnrichmentDocument>,
        transport: &Transport,
    ) -> JobPost {
        let mut budget = BudgetController::from_settings(&self.config.budget);
        let collector = DocumentCollector {
            transport,
            cleaner: &self.cleaner,
            site: self.site,
            timeout: self.config.request_timeout(),
            user_agent: self.user_agent.as_deref(),
        };

        let detail = match detail {
            Some(document) => Some(document),
            None if self.config.sources.job_detail_page => {
                collector
                    .fetch_document(&job.job_url, DocumentSource::JobDetailPage, &mut budget)
                    .await
            }
            None => None,
        };

        let documents = collector
            .collect(
                detail,
                CollectTargets {
                    job_url_direct: job.job_url_direct.as_deref(),
                    company_url: job.company_url.as_deref(),
                },
                &self.config.sources,
                &mut budget,
                &self.company_pages,
            )
            .await;

        let extraction = extractors::extract(&documents, &seed_text(&job), self.site);
        apply_extraction(&mut job, &extraction, &self.config.fields);

        let usage = budget.usage();
        tracing::debug!(
            site = %self.site,
            url = %job.job_url,
            documents = documents.len(),
            requests = usage.requests,
            exhausted = usage.exhausted,
            "Enriched job"
        );

        if self.config.expose_meta {
            let mut sources_used = Vec::new();
            for document in &documents {
                if !sources_used.contains(&document.source) {
                    sources_used.push(document.source);
                }
            }
            job.enrichment_meta = Some(EnrichmentMeta {
                enabled: true,
                sources_used,
                budget_used: usage,
                field_confidence: extraction
                    .field_confidence
                    .into_iter()
                    .filter(|(field, _)| field.is_enabled(&self.config.fields))
                    .collect(),
            });
        }
        job
    }
}

fn seed_text(job: &JobPost) -> String {
    let location = job.location.as_ref().map(|l| l.display());
    [
        Some(job.title.as_str()),
        job.company_name.as_deref(),
        location.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
}

/// Fills opted-in fields. Lists are merged with what the source supplied;
/// scalar fields are only set when the source left them empty.
fn apply_extraction(job: &mut JobPost, extraction: &EnrichmentExtraction, fields: &EnrichmentFields) {
    if fields.emails && extraction.emails.is_some() {
        job.emails =
            extractors::merge_unique_values(job.emails.as_deref(), extraction.emails.as_deref());
    }
    if fields.skills && extraction.skills.is_some() {
        job.skills =
            extractors::merge_unique_values(job.skills.as_deref(), extraction.skills.as_deref());
    }

    let fill = |slot: &mut Option<String>, enabled: bool, value: &Option<String>| {
        if enabled && slot.is_none() {
            slot.clone_from(value);
        }
    };
    fill(&mut job.job_level, fields.seniority, &extraction.seniority);
    fill(
        &mut job.company_url_direct,
        fields.company_website,
        &extraction.company_website,
    );
    fill(
        &mut job.work_from_home_type,
        fields.work_mode,
        &extraction.work_mode,
    );
    fill(
        &mut job.company_num_employees,
        fields.company_size,
        &extraction.company_size,
    );
}
