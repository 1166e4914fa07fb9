use std::time::Duration;

use serde::Deserialize;

pub mod catalog;
pub mod chrome;
pub mod pagination;
pub mod rows;

/// Errors raised while driving a browser session through the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// The document changed between locating an element and reading it.
    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Table section '{0}' not found")]
    SectionNotFound(String),

    #[error("Section '{section}' ended after {pages} pages, expected at least {expected}")]
    Truncated {
        section: String,
        pages: usize,
        expected: usize,
    },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub type CrawlerResult<T> = Result<T, CrawlerError>;

/// The single mutable document a scrape works against.
///
/// All locating happens on HTML snapshots returned by [`content`], so an
/// implementation only has to load pages, hand out markup and click.
///
/// [`content`]: BrowserSession::content
pub trait BrowserSession {
    /// Loads `url` and waits for the navigation to finish.
    fn navigate(&mut self, url: &str) -> CrawlerResult<()>;

    /// Returns the serialized markup of the current document.
    fn content(&mut self) -> CrawlerResult<String>;

    /// Returns the URL of the current document.
    fn current_url(&mut self) -> CrawlerResult<String>;

    /// Scrolls to and clicks the `nth` element matching `selector`.
    ///
    /// Implementations report a missing element as
    /// [`CrawlerError::StaleElement`]: the caller located it in a snapshot
    /// that no longer matches the live document.
    fn activate(&mut self, selector: &str, nth: usize) -> CrawlerResult<()>;
}

/// A named table section of the catalog page.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CatalogSection {
    /// Header text identifying the table, e.g. `Individual Test Solutions`.
    pub label: String,
    /// File-system friendly name used for the scraped CSV.
    pub slug: String,
    /// Page cap for this section.
    pub max_pages: usize,
    /// Fewer pages than this is treated as a layout change, not the end.
    #[serde(default)]
    pub min_expected_pages: Option<usize>,
}

/// Bounds on every wait a scrape performs.
#[derive(Clone, Debug)]
pub struct ScrapeTimeouts {
    /// Initial page load until any table wrapper is present.
    pub page_load: Duration,
    /// Until the requested section wrapper is present.
    pub wrapper: Duration,
    /// Until the section shows rows of a new page.
    pub rows: Duration,
    /// Extra time given to a pagination control that is not rendered yet.
    pub pagination: Duration,
    /// Interval between document polls.
    pub poll_interval: Duration,
    /// Pause after rows appear, letting late scripts finish rendering.
    pub settle: Duration,
}

impl Default for ScrapeTimeouts {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(20),
            wrapper: Duration::from_secs(10),
            rows: Duration::from_secs(15),
            pagination: Duration::from_secs(3),
            poll_interval: Duration::from_millis(250),
            settle: Duration::from_millis(1500),
        }
    }
}

/// Collapses runs of whitespace and trims, mirroring how browsers render text.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
