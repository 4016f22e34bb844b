use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentMeta;

/// One external job-posting site.
///
/// Ordering follows the site identifier string, which is also the primary
/// sort key of the result pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Linkedin,
    Indeed,
    ZipRecruiter,
    Glassdoor,
    Google,
    Bayt,
    Naukri,
    Bdjobs,
}

impl Site {
    pub const ALL: [Site; 8] = [
        Site::Linkedin,
        Site::Indeed,
        Site::ZipRecruiter,
        Site::Glassdoor,
        Site::Google,
        Site::Bayt,
        Site::Naukri,
        Site::Bdjobs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Linkedin => "linkedin",
            Site::Indeed => "indeed",
            Site::ZipRecruiter => "zip_recruiter",
            Site::Glassdoor => "glassdoor",
            Site::Google => "google",
            Site::Bayt => "bayt",
            Site::Naukri => "naukri",
            Site::Bdjobs => "bdjobs",
        }
    }

    /// Registrable domain the site serves its own pages from.
    pub fn home_domain(&self) -> &'static str {
        match self {
            Site::Linkedin => "linkedin.com",
            Site::Indeed => "indeed.com",
            Site::ZipRecruiter => "ziprecruiter.com",
            Site::Glassdoor => "glassdoor.com",
            Site::Google => "google.com",
            Site::Bayt => "bayt.com",
            Site::Naukri => "naukri.com",
            Site::Bdjobs => "bdjobs.com",
        }
    }

    /// True when `domain` is the site's home domain or one of its sub-domains.
    pub fn owns_domain(&self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return false;
        }
        let home = self.home_domain();
        domain == home || domain.ends_with(&format!(".{home}"))
    }

    /// Default per-source concurrency before adaptive adjustment.
    pub fn default_concurrency(&self) -> usize {
        match self {
            Site::Indeed => 6,
            Site::ZipRecruiter => 5,
            Site::Google => 4,
            Site::Linkedin => 2,
            Site::Glassdoor => 3,
            Site::Bayt => 3,
            Site::Naukri => 4,
            Site::Bdjobs => 3,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Site::ALL
            .into_iter()
            .find(|site| site.as_str() == normalized || site.as_str().replace('_', "") == normalized)
            .ok_or_else(|| format!("Unknown site: {s}"))
    }
}

impl PartialOrd for Site {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Site {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    PerDiem,
    Nights,
    Other,
    Summer,
    Volunteer,
}

impl JobType {
    pub const ALL: [JobType; 10] = [
        JobType::FullTime,
        JobType::PartTime,
        JobType::Contract,
        JobType::Temporary,
        JobType::Internship,
        JobType::PerDiem,
        JobType::Nights,
        JobType::Other,
        JobType::Summer,
        JobType::Volunteer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "fulltime",
            JobType::PartTime => "parttime",
            JobType::Contract => "contract",
            JobType::Temporary => "temporary",
            JobType::Internship => "internship",
            JobType::PerDiem => "perdiem",
            JobType::Nights => "nights",
            JobType::Other => "other",
            JobType::Summer => "summer",
            JobType::Volunteer => "volunteer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompensationInterval {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
}

impl CompensationInterval {
    /// Multiplier that turns one unit of this interval into a yearly figure.
    pub fn annual_factor(&self) -> f64 {
        match self {
            CompensationInterval::Yearly => 1.0,
            CompensationInterval::Monthly => 12.0,
            CompensationInterval::Weekly => 52.0,
            CompensationInterval::Daily => 260.0,
            CompensationInterval::Hourly => 2080.0,
        }
    }

    /// Maps pay-period labels used by job sites (`YEAR`, `HOUR`, ...) as well
    /// as the interval's own name.
    pub fn from_pay_period(pay_period: &str) -> Option<Self> {
        match pay_period.trim().to_uppercase().as_str() {
            "YEAR" | "ANNUAL" | "YEARLY" => Some(CompensationInterval::Yearly),
            "MONTH" | "MONTHLY" => Some(CompensationInterval::Monthly),
            "WEEK" | "WEEKLY" => Some(CompensationInterval::Weekly),
            "DAY" | "DAILY" => Some(CompensationInterval::Daily),
            "HOUR" | "HOURLY" => Some(CompensationInterval::Hourly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    pub interval: Option<CompensationInterval>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub currency: Option<String>,
}

impl Compensation {
    /// True when amounts and currency are all present.
    pub fn is_complete(&self) -> bool {
        self.min_amount.is_some() && self.max_amount.is_some() && self.currency.is_some()
    }
}

/// Where a record's compensation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalarySource {
    DirectData,
    Description,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionFormat {
    #[default]
    Markdown,
    Html,
    Plain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Location {
    /// "City, State, Country" with missing parts skipped.
    pub fn display(&self) -> String {
        [&self.city, &self.state, &self.country]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A job posting as produced by a source provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: Option<String>,
    pub title: String,
    pub company_name: Option<String>,
    pub job_url: String,
    pub job_url_direct: Option<String>,
    pub location: Option<Location>,
    pub description: Option<String>,
    pub company_url: Option<String>,
    pub company_url_direct: Option<String>,
    pub job_type: Option<Vec<JobType>>,
    pub compensation: Option<Compensation>,
    pub date_posted: Option<NaiveDate>,
    pub emails: Option<Vec<String>>,
    pub is_remote: Option<bool>,
    pub job_level: Option<String>,
    pub company_industry: Option<String>,
    pub company_num_employees: Option<String>,
    pub company_logo: Option<String>,
    pub job_function: Option<String>,
    pub skills: Option<Vec<String>>,
    pub work_from_home_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_meta: Option<EnrichmentMeta>,
}

impl JobPost {
    pub fn new(title: impl Into<String>, job_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            job_url: job_url.into(),
            ..Default::default()
        }
    }
}

/// Successful output of one provider, tagged with its site.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub site: Site,
    pub jobs: Vec<JobPost>,
}

/// A job after the result pipeline: tagged with its site and with its salary
/// provenance resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedJob {
    pub site: Site,
    pub salary_source: Option<SalarySource>,
    #[serde(flatten)]
    pub post: JobPost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_roundtrip() {
        for site in Site::ALL {
            let parsed: Site = site.as_str().parse().unwrap();
            assert_eq!(parsed, site);
        }
        assert_eq!("ZipRecruiter".parse::<Site>().unwrap(), Site::ZipRecruiter);
        assert!("monster".parse::<Site>().is_err());
    }

    #[test]
    fn test_site_ordering_follows_identifier() {
        let mut sites = Site::ALL.to_vec();
        sites.sort();
        let names: Vec<_> = sites.iter().map(Site::as_str).collect();
        assert_eq!(
            names,
            vec![
                "bayt",
                "bdjobs",
                "glassdoor",
                "google",
                "indeed",
                "linkedin",
                "naukri",
                "zip_recruiter"
            ]
        );
    }

    #[test]
    fn test_site_owns_domain() {
        assert!(Site::Linkedin.owns_domain("www.linkedin.com"));
        assert!(Site::Linkedin.owns_domain("LinkedIn.com"));
        assert!(!Site::Linkedin.owns_domain("notlinkedin.com"));
        assert!(!Site::Linkedin.owns_domain(""));
    }

    #[test]
    fn test_pay_period_mapping() {
        assert_eq!(
            CompensationInterval::from_pay_period("YEAR"),
            Some(CompensationInterval::Yearly)
        );
        assert_eq!(
            CompensationInterval::from_pay_period("hourly"),
            Some(CompensationInterval::Hourly)
        );
        assert_eq!(CompensationInterval::from_pay_period("fortnight"), None);
    }

    #[test]
    fn test_location_display_skips_missing_parts() {
        let loc = Location {
            city: Some("Austin".into()),
            state: None,
            country: Some("USA".into()),
        };
        assert_eq!(loc.display(), "Austin, USA");
    }
}
