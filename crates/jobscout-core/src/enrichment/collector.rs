//! Budgeted fetching of the auxiliary pages used for enrichment.

use std::sync::Arc;
use std::time::Duration;

use super::budget::BudgetController;
use super::{CompanyPageCache, DocumentSource, EnrichmentDocument, url_domain};
use crate::config::EnrichmentSources;
use crate::models::Site;
use crate::traits::Cleaner;
use crate::transport::{HttpRequestSpec, RequestKind, Transport};

/// Paths probed on an employer's own domain.
pub const COMPANY_PAGE_PATHS: [&str; 3] = ["/careers", "/about", "/contact"];

/// Fetches enrichment documents for one source through the shared transport.
pub struct DocumentCollector<'a, C: Cleaner> {
    pub transport: &'a Transport,
    pub cleaner: &'a C,
    pub site: Site,
    /// Overrides the transport's default timeout when set.
    pub timeout: Option<Duration>,
    pub user_agent: Option<&'a str>,
}

/// URLs of the job being enriched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectTargets<'a> {
    pub job_url_direct: Option<&'a str>,
    pub company_url: Option<&'a str>,
}

impl<C: Cleaner> DocumentCollector<'_, C> {
    /// Fetches one page if the budget allows it. Every failure (budget,
    /// transport, status, content type, empty text) yields `None`.
    pub async fn fetch_document(
        &self,
        url: &str,
        source: DocumentSource,
        budget: &mut BudgetController,
    ) -> Option<EnrichmentDocument> {
        let domain = url_domain(url)?;
        if !budget.consume_request(&domain) {
            tracing::debug!(url, domain = %domain, "Enrichment budget refused request");
            return None;
        }

        let mut spec = HttpRequestSpec::get(url)
            .source(self.site)
            .kind(RequestKind::Detail);
        if let Some(timeout) = self.timeout {
            spec = spec.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            spec = spec.header("user-agent", user_agent);
        }

        let response = match self.transport.request(spec).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "Failed to fetch enrichment document");
                return None;
            }
        };
        if !response.ok {
            tracing::debug!(url, status = response.status, "Enrichment page not usable");
            return None;
        }
        let content_type = response.content_type().unwrap_or_default().to_lowercase();
        if !content_type.is_empty() && !content_type.contains("text/html") {
            tracing::debug!(url, content_type = %content_type, "Skipping non-HTML enrichment page");
            return None;
        }

        let text = match self.cleaner.clean(&response.text) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::debug!(url, error = %e, "Failed to clean enrichment page");
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }

        budget.record_collected_page();
        Some(EnrichmentDocument {
            source,
            domain: url_domain(&response.url).unwrap_or(domain),
            url: response.url,
            text,
            html: Some(response.text),
        })
    }

    /// Probes the fixed company paths under `origin`, each budgeted on its own.
    pub async fn fetch_company_pages(
        &self,
        origin: &url::Url,
        budget: &mut BudgetController,
    ) -> Vec<EnrichmentDocument> {
        let mut documents = Vec::new();
        for path in COMPANY_PAGE_PATHS {
            let Ok(target) = origin.join(path) else {
                continue;
            };
            if let Some(document) = self
                .fetch_document(target.as_str(), DocumentSource::CompanyPages, budget)
                .await
            {
                documents.push(document);
            }
        }
        documents
    }

    /// Gathers every enabled document for one job, starting with the detail
    /// page the source already fetched, if any.
    ///
    /// Company pages are shared across jobs through `cache`: concurrent jobs
    /// with the same employer domain fetch them once, charged to the budget
    /// of the job that got there first.
    pub async fn collect(
        &self,
        existing_detail: Option<EnrichmentDocument>,
        targets: CollectTargets<'_>,
        sources: &EnrichmentSources,
        budget: &mut BudgetController,
        cache: &CompanyPageCache,
    ) -> Vec<EnrichmentDocument> {
        let mut documents: Vec<EnrichmentDocument> = existing_detail.into_iter().collect();

        if sources.external_apply_page
            && let Some(apply_url) = targets.job_url_direct
            && let Some(document) = self
                .fetch_document(apply_url, DocumentSource::ExternalApplyPage, budget)
                .await
        {
            documents.push(document);
        }

        if !sources.company_pages {
            return documents;
        }

        let Some((domain, origin)) = [targets.job_url_direct, targets.company_url]
            .into_iter()
            .flatten()
            .find_map(company_origin)
        else {
            return documents;
        };
        if self.site.owns_domain(&domain) {
            return documents;
        }

        let pages = cache
            .get_with(domain, async {
                Arc::new(self.fetch_company_pages(&origin, budget).await)
            })
            .await;
        documents.extend(pages.iter().cloned());
        documents
    }
}

/// `(domain, origin)` of an absolute http(s) URL.
fn company_origin(raw: &str) -> Option<(String, url::Url)> {
    let parsed = url::Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let domain = url_domain(raw)?;
    let origin = url::Url::parse(&parsed.origin().ascii_serialization()).ok()?;
    Some((domain, origin))
}
