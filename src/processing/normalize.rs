//! Conversion of scraped table rows into the canonical catalog.
//!
//! Field-level problems never reject a record: they degrade to `false` or
//! `None`. The only records dropped are those without a name and repeats of
//! an already seen `(name, url)` pair.

use std::collections::HashSet;

use url::Url;

use crate::domain::assessment::{CanonicalAssessment, DURATION_SENTINEL, ScrapedRecord};

/// Label marking a supported feature; every other label means unsupported.
const SUPPORTED_LABEL: &str = "Yes";

/// Written by the scraper in place of a name it could not read.
const NAME_PLACEHOLDER: &str = "N/A";

/// Counters reported after a normalization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub records: usize,
    pub kept: usize,
    pub dropped_blank_name: usize,
    pub duplicates: usize,
}

pub fn parse_support_label(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case(SUPPORTED_LABEL)
}

/// Minutes as a non-negative integer; the sentinel and anything unparsable
/// yield `None`.
pub fn parse_duration(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(DURATION_SENTINEL) {
        return None;
    }
    value.parse().ok()
}

/// Makes a scraped link absolute against `origin`.
pub fn resolve_url(href: Option<&str>, origin: &Url) -> Option<String> {
    let href = href.map(str::trim).filter(|href| !href.is_empty())?;
    match origin.join(href) {
        Ok(url) => Some(url.to_string()),
        Err(error) => {
            log::warn!("Dropping unresolvable URL '{href}': {error}");
            None
        }
    }
}

/// Normalizes one record, or `None` when it has no usable name.
pub fn normalize_record(record: &ScrapedRecord, origin: &Url) -> Option<CanonicalAssessment> {
    let name = record.name.trim();
    if name.is_empty() || name == NAME_PLACEHOLDER {
        return None;
    }

    Some(CanonicalAssessment {
        name: name.to_string(),
        url: resolve_url(record.url.as_deref(), origin),
        remote_testing: parse_support_label(&record.remote_testing),
        adaptive_support: parse_support_label(&record.adaptive_support),
        duration: parse_duration(&record.duration),
        test_type: record.test_type.trim().to_string(),
    })
}

/// Normalizes a batch, keeping the first occurrence of every `(name, url)`
/// pair in input order.
pub fn normalize_records<I>(records: I, origin: &Url) -> (Vec<CanonicalAssessment>, NormalizeStats)
where
    I: IntoIterator<Item = ScrapedRecord>,
{
    let mut stats = NormalizeStats::default();
    let mut seen = HashSet::new();
    let mut catalog = Vec::new();

    for record in records {
        stats.records += 1;
        let Some(assessment) = normalize_record(&record, origin) else {
            stats.dropped_blank_name += 1;
            continue;
        };
        if !seen.insert((assessment.name.clone(), assessment.url.clone())) {
            stats.duplicates += 1;
            continue;
        }
        catalog.push(assessment);
    }

    stats.kept = catalog.len();
    (catalog, stats)
}
