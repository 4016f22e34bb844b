//! Salary parsing helpers shared by the result pipeline and providers.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Compensation, CompensationInterval, JobType};

static SALARY_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\d+(?:,\d+)?(?:\.\d+)?)([kK]?)\s*[-—–]\s*(?:\$)?(\d+(?:,\d+)?(?:\.\d+)?)([kK]?)")
        .expect("valid salary regex")
});

static JOB_TYPE_PATTERNS: LazyLock<Vec<(JobType, Regex)>> = LazyLock::new(|| {
    [
        (JobType::FullTime, r"(?i)full\s?time"),
        (JobType::PartTime, r"(?i)part\s?time"),
        (JobType::Internship, r"(?i)internship"),
        (JobType::Contract, r"(?i)contract"),
        (JobType::Temporary, r"(?i)temporary"),
        (JobType::PerDiem, r"(?i)per\s?diem"),
        (JobType::Nights, r"(?i)nights?"),
        (JobType::Other, r"(?i)other"),
        (JobType::Summer, r"(?i)summer"),
        (JobType::Volunteer, r"(?i)volunteer"),
    ]
    .into_iter()
    .map(|(job_type, pattern)| (job_type, Regex::new(pattern).expect("valid job type regex")))
    .collect()
});

/// Bounds used to classify and accept a salary range found in free text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryParseOptions {
    pub lower_limit: f64,
    pub upper_limit: f64,
    /// Amounts below this are hourly.
    pub hourly_threshold: f64,
    /// Amounts below this (and not hourly) are monthly.
    pub monthly_threshold: f64,
    /// Report annual amounts with a yearly interval.
    pub annualize: bool,
}

impl Default for SalaryParseOptions {
    fn default() -> Self {
        Self {
            lower_limit: 1_000.0,
            upper_limit: 700_000.0,
            hourly_threshold: 350.0,
            monthly_threshold: 30_000.0,
            annualize: false,
        }
    }
}

impl SalaryParseOptions {
    pub fn annualized() -> Self {
        Self {
            annualize: true,
            ..Self::default()
        }
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().map(f64::trunc)
}

/// Finds a `$min - $max` range in `text` and classifies it.
///
/// The magnitude of the lower bound picks the interval (hourly, monthly or
/// yearly). The range is accepted only when both annualized bounds fall
/// inside the configured limits and min is below max; anything else yields
/// `None`.
pub fn extract_salary(text: &str, options: &SalaryParseOptions) -> Option<Compensation> {
    let captures = SALARY_RANGE.captures(text)?;

    let mut min = parse_amount(captures.get(1)?.as_str())?;
    let mut max = parse_amount(captures.get(3)?.as_str())?;
    let thousands = |idx: usize| {
        captures
            .get(idx)
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("k"))
    };
    if thousands(2) || thousands(4) {
        min *= 1000.0;
        max *= 1000.0;
    }

    let interval = if min < options.hourly_threshold {
        if max >= options.hourly_threshold {
            return None;
        }
        CompensationInterval::Hourly
    } else if min < options.monthly_threshold {
        if max >= options.monthly_threshold {
            return None;
        }
        CompensationInterval::Monthly
    } else {
        CompensationInterval::Yearly
    };

    let factor = interval.annual_factor();
    let (annual_min, annual_max) = (min * factor, max * factor);
    let in_range = |v: f64| options.lower_limit <= v && v <= options.upper_limit;
    if !(in_range(annual_min) && in_range(annual_max) && annual_min < annual_max) {
        return None;
    }

    let (interval, min, max) = if options.annualize {
        (CompensationInterval::Yearly, annual_min, annual_max)
    } else {
        (interval, min, max)
    };

    Some(Compensation {
        interval: Some(interval),
        min_amount: Some(min),
        max_amount: Some(max),
        currency: Some("USD".to_string()),
    })
}

/// Converts amounts to yearly figures in place and sets the interval to
/// yearly. Leaves compensation without both amounts untouched.
pub fn convert_to_annual(compensation: &mut Compensation) {
    let (Some(min), Some(max)) = (compensation.min_amount, compensation.max_amount) else {
        return;
    };
    let factor = compensation
        .interval
        .map_or(1.0, |interval| interval.annual_factor());
    compensation.min_amount = Some(min * factor);
    compensation.max_amount = Some(max * factor);
    compensation.interval = Some(CompensationInterval::Yearly);
}

/// Parses a display amount such as `"$1,234.50"` or `"1.234,50 €"`.
///
/// Separators more than three characters from the end are treated as
/// thousands separators; a trailing comma is read as a decimal point.
/// Returns `None` when no number can be read.
pub fn currency_parser(raw: &str) -> Option<f64> {
    let mut normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | ','))
        .collect();

    let len = normalized.chars().count();
    if len >= 3 {
        normalized = normalized
            .chars()
            .enumerate()
            .filter(|(i, c)| !(matches!(c, '.' | ',') && *i < len - 3))
            .map(|(_, c)| c)
            .collect();
    }

    let trailing: String = {
        let chars: Vec<char> = normalized.chars().collect();
        chars[chars.len().saturating_sub(3)..].iter().collect()
    };
    if !trailing.contains('.') && trailing.contains(',') {
        normalized = normalized.replacen(',', ".", 1);
    }

    let parsed = leading_number(&normalized)?;
    Some((parsed * 100.0).round() / 100.0)
}

/// Longest numeric prefix, read the way lenient float parsers do.
fn leading_number(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '-' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            c if c.is_ascii_digit() => {}
            _ => break,
        }
        end = i + c.len_utf8();
    }
    let value = s[..end].trim_end_matches('.').parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Scans a description for employment-type keywords.
pub fn extract_job_types(description: &str) -> Option<Vec<JobType>> {
    let found: Vec<JobType> = JOB_TYPE_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(description))
        .map(|(job_type, _)| *job_type)
        .collect();
    (!found.is_empty()).then_some(found)
}
