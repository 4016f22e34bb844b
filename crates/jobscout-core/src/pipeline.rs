//! Result pipeline: salary resolution, dedup and ordering of merged batches.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::SalaryFallback;
use crate::country::Country;
use crate::models::{CompensationInterval, JobPost, NormalizedJob, SalarySource, Site, SourceBatch};
use crate::salary::{self, SalaryParseOptions};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub country: &'static Country,
    pub annualize_salary: bool,
    pub salary_fallback: SalaryFallback,
}

/// Normalizes every record, drops duplicates and sorts the result.
///
/// Records keep their source's discovery order until the final sort, which is
/// stable, so equal keys preserve it.
pub fn run(batches: Vec<SourceBatch>, options: &PipelineOptions) -> Vec<NormalizedJob> {
    let normalized = batches.into_iter().flat_map(|batch| {
        let site = batch.site;
        batch
            .jobs
            .into_iter()
            .map(move |job| normalize(job, site, options))
    });

    let mut jobs = dedup(normalized);
    jobs.sort_by(compare);
    jobs
}

fn normalize(mut post: JobPost, site: Site, options: &PipelineOptions) -> NormalizedJob {
    let mut salary_source = None;

    if let Some(compensation) = post
        .compensation
        .as_mut()
        .filter(|c| c.min_amount.is_some())
    {
        if options.annualize_salary
            && compensation
                .interval
                .is_some_and(|interval| interval != CompensationInterval::Yearly)
        {
            salary::convert_to_annual(compensation);
        }
        salary_source = Some(SalarySource::DirectData);
    } else if options.salary_fallback == SalaryFallback::UsOnly && options.country.is_usa() {
        let parse_options = SalaryParseOptions {
            annualize: options.annualize_salary,
            ..SalaryParseOptions::default()
        };
        if let Some(parsed) = post
            .description
            .as_deref()
            .and_then(|text| salary::extract_salary(text, &parse_options))
        {
            post.compensation = Some(parsed);
            salary_source = Some(SalarySource::Description);
        }
    }

    // A provenance tag always has a complete amount behind it.
    if !post.compensation.as_ref().is_some_and(|c| c.is_complete()) {
        salary_source = None;
    }

    NormalizedJob {
        site,
        salary_source,
        post,
    }
}

fn dedup(jobs: impl Iterator<Item = NormalizedJob>) -> Vec<NormalizedJob> {
    let mut seen = HashSet::new();
    jobs.filter(|job| {
        seen.insert((
            job.site,
            job.post.job_url.clone(),
            job.post.id.clone().unwrap_or_default(),
        ))
    })
    .collect()
}

/// Site ascending, then newest first; undated records sort last.
fn compare(left: &NormalizedJob, right: &NormalizedJob) -> Ordering {
    left.site
        .cmp(&right.site)
        .then_with(|| right.post.date_posted.cmp(&left.post.date_posted))
}
