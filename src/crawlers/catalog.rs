use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::crawlers::normalize_whitespace;
use crate::crawlers::pagination::{
    LastPage, NEXT_LINK_SELECTOR, NextPage, locate_pagination, next_page,
};
use crate::crawlers::rows::{ROW_SELECTOR, parse_rows};
use crate::crawlers::{BrowserSession, CatalogSection, CrawlerError, CrawlerResult, ScrapeTimeouts};
use crate::domain::assessment::RawRow;

pub const TABLE_WRAPPER_SELECTOR: &str = "div.custom__table-wrapper";

static TABLE_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(TABLE_WRAPPER_SELECTOR).expect("static selector"));
static SECTION_HEADER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("thead th.custom__table-heading__title").expect("static selector")
});
static TABLE_BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody").expect("static selector"));
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(ROW_SELECTOR).expect("static selector"));

/// Finds the table wrapper whose header mentions `label`.
///
/// Wrappers are scanned in full on every call; their order on the page is
/// not stable between renders.
pub fn find_section_wrapper<'a>(document: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let label = normalize_whitespace(label);
    document.select(&TABLE_WRAPPER).find(|wrapper| {
        wrapper
            .select(&SECTION_HEADER)
            .any(|header| normalize_whitespace(&header.text().collect::<String>()).contains(&label))
    })
}

/// Markup of the section's table body, used both for parsing and for
/// telling one page from the next.
fn section_body(wrapper: ElementRef<'_>) -> Option<String> {
    wrapper.select(&TABLE_BODY).next().map(|body| body.html())
}

/// Result of processing one page, not yet committed to the section.
struct PageScrape {
    rows: Vec<RawRow>,
    body: String,
    next: NextPage,
}

/// Walks the paginated table sections of the assessment catalog.
pub struct CatalogCrawler {
    start_url: Url,
    timeouts: ScrapeTimeouts,
}

impl CatalogCrawler {
    pub fn new(start_url: &str, timeouts: ScrapeTimeouts) -> CrawlerResult<Self> {
        Ok(Self {
            start_url: parse_url(start_url)?,
            timeouts,
        })
    }

    /// Scrapes every page of `section`, starting from the catalog URL.
    ///
    /// Returns [`CrawlerError::SectionNotFound`] when the section is absent
    /// from the first page. Running out of pages, hitting the page cap,
    /// timeouts and browser errors on later pages all end the section and
    /// return the rows collected so far, including those of a page whose
    /// next control could not be followed.
    pub fn scrape_section<S>(
        &self,
        session: &mut S,
        section: &CatalogSection,
    ) -> CrawlerResult<Vec<RawRow>>
    where
        S: BrowserSession + ?Sized,
    {
        let label = section.label.as_str();
        log::info!("Scraping section '{label}' from {}", self.start_url);

        session.navigate(self.start_url.as_str())?;
        self.poll(session, self.timeouts.page_load, |document| {
            document.select(&TABLE_WRAPPER).next().map(|_| ())
        })
        .map_err(|error| match error {
            CrawlerError::Timeout { .. } => CrawlerError::SectionNotFound(label.to_string()),
            other => other,
        })?;

        let mut rows = Vec::new();
        let mut previous_body: Option<String> = None;
        let mut page = 1;
        let mut pages_scraped = 0;
        let mut stale_retry_used = false;

        while page <= section.max_pages {
            log::info!("Scraping page {page} of section '{label}'");

            let scraped = match self.scrape_page(session, label, previous_body.as_deref()) {
                Ok(scraped) => scraped,
                Err(CrawlerError::StaleElement(reason)) if !stale_retry_used => {
                    log::warn!("Page {page} of section '{label}' went stale ({reason}); retrying");
                    stale_retry_used = true;
                    continue;
                }
                Err(CrawlerError::SectionNotFound(_)) if page == 1 => {
                    return Err(CrawlerError::SectionNotFound(label.to_string()));
                }
                Err(CrawlerError::SectionNotFound(_)) => {
                    log::info!("Section '{label}' not found on page {page}; assuming end of data");
                    break;
                }
                Err(error) => {
                    log::warn!("Stopping section '{label}' on page {page}: {error}");
                    break;
                }
            };

            let advanced = if page < section.max_pages {
                self.advance(session, &scraped.next)
            } else {
                Ok(())
            };
            if let Err(CrawlerError::StaleElement(reason)) = &advanced
                && !stale_retry_used
            {
                log::warn!("Next control of page {page} in section '{label}' went stale ({reason}); retrying");
                stale_retry_used = true;
                continue;
            }

            log::info!(
                "Scraped {} rows from page {page} of section '{label}'",
                scraped.rows.len()
            );
            rows.extend(scraped.rows);
            previous_body = Some(scraped.body);
            pages_scraped += 1;
            stale_retry_used = false;

            if let Err(error) = advanced {
                log::warn!("Stopping section '{label}' after page {page}: {error}");
                break;
            }
            match scraped.next {
                NextPage::Last(reason) => {
                    log::info!("Page {page} is the last page of section '{label}': {reason:?}");
                    break;
                }
                _ if page == section.max_pages => {
                    log::info!("Reached page cap {page} for section '{label}'");
                    break;
                }
                _ => page += 1,
            }
        }

        if let Some(expected) = section.min_expected_pages
            && pages_scraped < expected
        {
            return Err(CrawlerError::Truncated {
                section: label.to_string(),
                pages: pages_scraped,
                expected,
            });
        }

        log::info!(
            "Finished section '{label}': {pages_scraped} pages, {} rows",
            rows.len()
        );
        Ok(rows)
    }

    fn scrape_page<S>(
        &self,
        session: &mut S,
        label: &str,
        previous_body: Option<&str>,
    ) -> CrawlerResult<PageScrape>
    where
        S: BrowserSession + ?Sized,
    {
        self.wait_for_rows(session, label, previous_body)?;
        if !self.timeouts.settle.is_zero() {
            thread::sleep(self.timeouts.settle);
        }

        let html = session.content()?;
        let current_url = parse_url(&session.current_url()?)?;
        let document = Html::parse_document(&html);

        let wrapper = find_section_wrapper(&document, label).ok_or_else(|| {
            CrawlerError::StaleElement(format!("section '{label}' vanished after its rows loaded"))
        })?;
        let body = section_body(wrapper).ok_or_else(|| {
            CrawlerError::StaleElement(format!("table body of section '{label}' vanished"))
        })?;

        let mut rows = Vec::new();
        for (position, parsed) in parse_rows(&body).into_iter().enumerate() {
            match parsed {
                Ok(row) => rows.push(row),
                Err(error) => {
                    log::warn!("Skipping row {} of section '{label}': {error}", position + 1)
                }
            }
        }
        if rows.is_empty() {
            log::warn!("Rows were present in section '{label}' but none could be parsed");
        }

        let next = match locate_pagination(wrapper, &document) {
            Some((strategy, pagination)) => {
                log::debug!("Found pagination of section '{label}' via {strategy}");
                next_page(pagination, &document, &current_url)
            }
            None => self.wait_for_pagination(session, label, &current_url),
        };

        Ok(PageScrape { rows, body, next })
    }

    /// Waits until the section shows data rows that differ from the
    /// previous page's.
    fn wait_for_rows<S>(
        &self,
        session: &mut S,
        label: &str,
        previous_body: Option<&str>,
    ) -> CrawlerResult<()>
    where
        S: BrowserSession + ?Sized,
    {
        let started = Instant::now();
        let mut wrapper_seen = false;

        loop {
            let document = Html::parse_document(&session.content()?);
            if let Some(wrapper) = find_section_wrapper(&document, label) {
                wrapper_seen = true;
                let has_rows = wrapper.select(&ROW).next().is_some();
                let is_new_page = previous_body
                    .is_none_or(|previous| section_body(wrapper).as_deref() != Some(previous));
                if has_rows && is_new_page {
                    return Ok(());
                }
            }

            let waited = started.elapsed();
            if wrapper_seen && waited >= self.timeouts.rows {
                return Err(CrawlerError::Timeout {
                    what: format!("rows of section '{label}'"),
                    waited,
                });
            }
            if !wrapper_seen && waited >= self.timeouts.wrapper {
                return Err(CrawlerError::SectionNotFound(label.to_string()));
            }
            thread::sleep(self.timeouts.poll_interval);
        }
    }

    /// Gives a late pagination control a bounded chance to render.
    fn wait_for_pagination<S>(&self, session: &mut S, label: &str, current_url: &Url) -> NextPage
    where
        S: BrowserSession + ?Sized,
    {
        let found = self.poll(session, self.timeouts.pagination, |document| {
            let wrapper = find_section_wrapper(document, label)?;
            locate_pagination(wrapper, document)
                .map(|(_, pagination)| next_page(pagination, document, current_url))
        });

        match found {
            Ok(next) => next,
            Err(error) => {
                log::info!("No pagination controls for section '{label}' ({error})");
                NextPage::Last(LastPage::NoPagination)
            }
        }
    }

    fn advance<S>(&self, session: &mut S, next: &NextPage) -> CrawlerResult<()>
    where
        S: BrowserSession + ?Sized,
    {
        match next {
            NextPage::Navigate(url) => {
                log::debug!("Navigating to next page {url}");
                session.navigate(url.as_str())
            }
            NextPage::Activate { nth } => {
                log::debug!("Activating next control #{nth}");
                session.activate(NEXT_LINK_SELECTOR, *nth)
            }
            NextPage::Last(_) => Ok(()),
        }
    }

    /// Re-reads the document until `probe` finds something or `timeout` passes.
    fn poll<S, T, F>(&self, session: &mut S, timeout: Duration, mut probe: F) -> CrawlerResult<T>
    where
        S: BrowserSession + ?Sized,
        F: FnMut(&Html) -> Option<T>,
    {
        let started = Instant::now();
        loop {
            let document = Html::parse_document(&session.content()?);
            if let Some(found) = probe(&document) {
                return Ok(found);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(CrawlerError::Timeout {
                    what: "page elements".to_string(),
                    waited,
                });
            }
            thread::sleep(self.timeouts.poll_interval);
        }
    }
}

fn parse_url(url: &str) -> CrawlerResult<Url> {
    Url::parse(url).map_err(|error| CrawlerError::InvalidUrl {
        url: url.to_string(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::find_section_wrapper;

    const PAGE: &str = r#"
        <div class="custom__table-wrapper" id="solutions">
            <table>
                <thead><tr><th class="custom__table-heading__title">Pre-packaged Job Solutions</th></tr></thead>
            </table>
        </div>
        <div class="custom__table-wrapper" id="tests">
            <table>
                <thead><tr>
                    <th class="custom__table-heading__title">
                        Individual   Test
                        Solutions
                    </th>
                </tr></thead>
            </table>
        </div>
    "#;

    #[test]
    fn find_section_wrapper_matches_header_text() {
        let document = Html::parse_document(PAGE);

        let wrapper = find_section_wrapper(&document, "Individual Test Solutions")
            .expect("section should be found");

        assert_eq!(wrapper.value().id(), Some("tests"));
    }

    #[test]
    fn find_section_wrapper_returns_none_for_unknown_label() {
        let document = Html::parse_document(PAGE);

        assert!(find_section_wrapper(&document, "Bundles").is_none());
    }
}
