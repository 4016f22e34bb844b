//! Heuristic field extraction over collected enrichment documents.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::{Confidence, EnrichmentDocument, EnrichmentExtraction, EnrichmentField, url_domain};
use crate::models::Site;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static PLAIN_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"));

static OBFUSCATED_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)([a-z0-9._%+-]+)\s*(?:@|\(at\)|\[at\]|\sat\s)\s*([a-z0-9.-]+)\s*(?:\.|\(dot\)|\[dot\]|\sdot\s)\s*([a-z]{2,})",
    )
});

static MAILTO: LazyLock<Regex> = LazyLock::new(|| compile(r#"(?i)mailto:([^"'?\s>]+)"#));

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| compile(r#"(?i)https?://[^\s"'<>]+"#));

static SKILLS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("TypeScript", r"\btypescript\b"),
        ("JavaScript", r"\bjavascript\b"),
        ("Node.js", r"\bnode(?:\.js)?\b"),
        ("React", r"\breact\b"),
        ("Python", r"\bpython\b"),
        ("Java", r"\bjava\b"),
        ("Golang", r"\bgolang\b|\bgo\b"),
        ("Rust", r"\brust\b"),
        ("Docker", r"\bdocker\b"),
        ("Kubernetes", r"\bkubernetes\b"),
        ("AWS", r"\baws\b"),
        ("Azure", r"\bazure\b"),
        ("GCP", r"\bgcp\b|\bgoogle cloud\b"),
        ("SQL", r"\bsql\b"),
        ("PostgreSQL", r"\bpostgresql\b|\bpostgres\b"),
        ("MySQL", r"\bmysql\b"),
        ("MongoDB", r"\bmongodb\b"),
        ("Redis", r"\bredis\b"),
        ("GraphQL", r"\bgraphql\b"),
        ("REST API", r"\brest api\b|\brestful\b"),
        ("Terraform", r"\bterraform\b"),
        ("CI/CD", r"\bci/cd\b|\bcontinuous integration\b"),
        ("Git", r"\bgit\b"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, compile(&format!("(?i){pattern}"))))
    .collect()
});

/// Ordered most to least senior; the first band that matches wins.
static SENIORITY: LazyLock<Vec<(&'static str, Confidence, Regex)>> = LazyLock::new(|| {
    [
        ("executive", Confidence::High, r"executive|\bchief\b|vice president|\bvp\b"),
        ("director", Confidence::High, r"\bdirector\b"),
        ("principal", Confidence::High, r"\bprincipal\b"),
        ("staff", Confidence::High, r"\bstaff\b"),
        ("senior", Confidence::High, r"\bsenior\b|\bsr\."),
        ("mid", Confidence::Medium, r"\bmid[- ]level\b|\bintermediate\b"),
        ("junior", Confidence::Medium, r"\bjunior\b|\bjr\."),
        ("entry", Confidence::Medium, r"\bentry[- ]level\b|\bintern(?:ship)?\b|\bgraduate\b"),
    ]
    .into_iter()
    .map(|(band, confidence, pattern)| (band, confidence, compile(&format!("(?i){pattern}"))))
    .collect()
});

static WORK_MODES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Hybrid", r"hybrid"),
        ("On-site", r"on[- ]site|onsite"),
        ("Remote", r"remote|work from home|\bwfh\b"),
    ]
    .into_iter()
    .map(|(mode, pattern)| (mode, compile(&format!("(?i){pattern}"))))
    .collect()
});

static SIZE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b(\d{1,3}(?:,\d{3})?\s*-\s*\d{1,3}(?:,\d{3})?)\s+employees?\b")
});

static SIZE_PLUS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\b(\d{1,3}(?:,\d{3})?\+?)\s+employees?\b"));

static SIZE_OVER: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)\b((?:over|more than)\s+\d{1,3}(?:,\d{3})?\s+employees?)\b")
});

/// Trims, drops empties and removes case-insensitive duplicates, keeping the
/// first spelling seen.
pub fn dedup_values<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|value| {
            let value = value.as_ref().trim();
            (!value.is_empty() && seen.insert(value.to_lowercase())).then(|| value.to_string())
        })
        .collect()
}

/// Union of two optional lists, existing values first.
pub fn merge_unique_values(
    existing: Option<&[String]>,
    incoming: Option<&[String]>,
) -> Option<Vec<String>> {
    let merged = dedup_values(
        existing
            .unwrap_or_default()
            .iter()
            .chain(incoming.unwrap_or_default()),
    );
    (!merged.is_empty()).then_some(merged)
}

fn extract_emails(documents: &[EnrichmentDocument]) -> Option<(Vec<String>, Confidence)> {
    let plain: Vec<String> = documents
        .iter()
        .flat_map(|doc| PLAIN_EMAIL.captures_iter(&doc.text))
        .map(|caps| caps[0].to_string())
        .collect();

    let obfuscated: Vec<String> = documents
        .iter()
        .flat_map(|doc| OBFUSCATED_EMAIL.captures_iter(&doc.text))
        .map(|caps| format!("{}@{}.{}", &caps[1], &caps[2], &caps[3]))
        .collect();

    let mailto: Vec<String> = documents
        .iter()
        .filter_map(|doc| doc.html.as_deref())
        .flat_map(|html| MAILTO.captures_iter(html))
        .map(|caps| caps[1].trim().to_string())
        .collect();

    let all = dedup_values(plain.iter().chain(&obfuscated).chain(&mailto));
    if all.is_empty() {
        return None;
    }

    let confidence = if !mailto.is_empty() {
        Confidence::High
    } else if !plain.is_empty() {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    Some((all, confidence))
}

fn extract_skills(text: &str) -> Option<Vec<String>> {
    let matched = dedup_values(
        SKILLS
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(label, _)| *label),
    );
    (!matched.is_empty()).then_some(matched)
}

fn extract_seniority(text: &str) -> Option<(String, Confidence)> {
    SENIORITY
        .iter()
        .find(|(_, _, re)| re.is_match(text))
        .map(|(band, confidence, _)| (band.to_string(), *confidence))
}

fn extract_work_mode(text: &str) -> Option<String> {
    WORK_MODES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(mode, _)| mode.to_string())
}

fn extract_company_size(text: &str) -> Option<String> {
    // A bare count wins over "over N employees", so both yield the number.
    [&SIZE_RANGE, &SIZE_PLUS, &SIZE_OVER]
        .into_iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].trim().to_lowercase())
}

/// Origin of an absolute http(s) URL outside the source's own domain.
fn canonical_website(raw: &str, site: Site) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let domain = url_domain(raw)?;
    if site.owns_domain(&domain) {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}

fn extract_company_website(
    documents: &[EnrichmentDocument],
    site: Site,
) -> Option<(String, Confidence)> {
    documents.iter().find_map(|doc| {
        if let Some(website) = canonical_website(&doc.url, site) {
            return Some((website, Confidence::High));
        }
        ABSOLUTE_URL
            .find_iter(&doc.text)
            .find_map(|m| canonical_website(m.as_str(), site))
            .map(|website| (website, Confidence::Medium))
    })
}

/// Runs every extractor over `documents`. `seed_text` (title, company,
/// location) joins the document text for the keyword passes.
pub fn extract(documents: &[EnrichmentDocument], seed_text: &str, site: Site) -> EnrichmentExtraction {
    let combined = std::iter::once(seed_text)
        .chain(documents.iter().map(|doc| doc.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    let mut field_confidence = BTreeMap::new();

    let emails = extract_emails(documents).map(|(values, confidence)| {
        field_confidence.insert(EnrichmentField::Emails, confidence);
        values
    });
    let skills = extract_skills(&combined).inspect(|_| {
        field_confidence.insert(EnrichmentField::Skills, Confidence::Medium);
    });
    let seniority = extract_seniority(&combined).map(|(value, confidence)| {
        field_confidence.insert(EnrichmentField::Seniority, confidence);
        value
    });
    let company_website = extract_company_website(documents, site).map(|(value, confidence)| {
        field_confidence.insert(EnrichmentField::CompanyWebsite, confidence);
        value
    });
    let work_mode = extract_work_mode(&combined).inspect(|_| {
        field_confidence.insert(EnrichmentField::WorkMode, Confidence::Medium);
    });
    let company_size = extract_company_size(&combined).inspect(|_| {
        field_confidence.insert(EnrichmentField::CompanySize, Confidence::Low);
    });

    EnrichmentExtraction {
        emails,
        skills,
        seniority,
        company_website,
        work_mode,
        company_size,
        field_confidence,
    }
}
