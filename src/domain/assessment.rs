use serde::{Deserialize, Serialize};

/// Duration placeholder used by the catalog listing, which never shows one.
pub const DURATION_SENTINEL: &str = "N/A";

/// One data row scraped from a catalog table section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRow {
    pub name: String,
    /// The `href` exactly as found in the markup; resolved by the normalizer.
    pub url: Option<String>,
    pub remote_testing: bool,
    pub adaptive_support: bool,
    /// Concatenated category keys, e.g. `CPAB`.
    pub test_type: String,
    pub duration: String,
}

/// Tabular form of a [`RawRow`] as written to and read from the scrape CSV.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    #[serde(rename = "Assessment Name")]
    pub name: String,
    #[serde(rename = "Assessment URL")]
    pub url: Option<String>,
    #[serde(rename = "Remote Testing Support")]
    pub remote_testing: String,
    #[serde(rename = "Adaptive/IRT Support")]
    pub adaptive_support: String,
    #[serde(rename = "Test Type")]
    pub test_type: String,
    #[serde(rename = "Duration")]
    pub duration: String,
}

fn support_label(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

impl From<&RawRow> for ScrapedRecord {
    fn from(row: &RawRow) -> Self {
        Self {
            name: row.name.clone(),
            url: row.url.clone(),
            remote_testing: support_label(row.remote_testing),
            adaptive_support: support_label(row.adaptive_support),
            test_type: row.test_type.clone(),
            duration: row.duration.clone(),
        }
    }
}

/// A normalized catalog entry.
///
/// The position of an assessment in the catalog is its key in the vector
/// index, so catalogs are always handled as ordered lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAssessment {
    pub name: String,
    pub url: Option<String>,
    pub remote_testing: bool,
    pub adaptive_support: bool,
    /// Completion time in minutes, when the catalog states one.
    pub duration: Option<u32>,
    pub test_type: String,
}

/// A catalog entry returned for a query together with its distance.
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub assessment: CanonicalAssessment,
    /// Euclidean distance between the query and assessment embeddings.
    pub distance: f32,
}
