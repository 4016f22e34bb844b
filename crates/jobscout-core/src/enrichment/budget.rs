use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::EnrichmentBudgetSettings;

/// Snapshot of what one job's enrichment has spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub requests: u32,
    /// Distinct domains that received at least one request.
    pub domains: usize,
    pub pages: u32,
    pub exhausted: bool,
}

/// Caps the extra requests spent enriching a single job.
///
/// Counters only grow. Create one controller per job and drop it when the
/// job is done.
#[derive(Debug, Clone)]
pub struct BudgetController {
    max_requests: u32,
    max_pages_per_domain: u32,
    requests: u32,
    pages: u32,
    exhausted: bool,
    per_domain: HashMap<String, u32>,
}

impl BudgetController {
    pub fn new(max_requests: u32, max_pages_per_domain: u32) -> Self {
        Self {
            max_requests,
            max_pages_per_domain,
            requests: 0,
            pages: 0,
            exhausted: false,
            per_domain: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &EnrichmentBudgetSettings) -> Self {
        Self::new(
            settings.max_extra_requests_per_job,
            settings.max_pages_per_domain,
        )
    }

    /// Reserves one request against `domain`. Returns false when the job's
    /// request cap is spent (which also marks the budget exhausted) or the
    /// domain has reached its page cap.
    pub fn consume_request(&mut self, domain: &str) -> bool {
        if self.requests >= self.max_requests {
            self.exhausted = true;
            return false;
        }

        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return false;
        }

        let count = self.per_domain.entry(domain).or_insert(0);
        if *count >= self.max_pages_per_domain {
            return false;
        }
        *count += 1;
        self.requests += 1;
        true
    }

    /// Counts a fetched page that was usable.
    pub fn record_collected_page(&mut self) {
        self.pages += 1;
    }

    pub fn usage(&self) -> BudgetUsage {
        BudgetUsage {
            requests: self.requests,
            domains: self.per_domain.values().filter(|count| **count > 0).count(),
            pages: self.pages,
            exhausted: self.exhausted,
        }
    }
}
