//! Helpers for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use assessment_recommender::crawlers::{BrowserSession, CrawlerError, CrawlerResult, ScrapeTimeouts};
use assessment_recommender::domain::assessment::CanonicalAssessment;
use assessment_recommender::processing::embedding::{EmbeddingError, TextEmbedder};

pub const START_URL: &str = "https://catalog.test/products/";

pub fn page_url(page: usize) -> String {
    format!("{START_URL}?page={page}")
}

/// Timeouts that never wait: every poll looks at the document exactly once.
pub fn instant_timeouts() -> ScrapeTimeouts {
    ScrapeTimeouts {
        page_load: Duration::ZERO,
        wrapper: Duration::ZERO,
        rows: Duration::ZERO,
        pagination: Duration::ZERO,
        poll_interval: Duration::ZERO,
        settle: Duration::ZERO,
    }
}

/// What the next control of a rendered page looks like.
pub enum Next {
    Link(String),
    Script,
    Disabled,
    Missing,
}

/// Renders a catalog page holding one table section.
pub fn catalog_page(label: &str, names: &[&str], next: Next) -> String {
    let rows: String = names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let slug = name.to_lowercase().replace(' ', "-");
            format!(
                r#"<tr data-entity-id="{position}">
                    <td class="custom__table-heading__title"><a href="/view/{slug}/">{name}</a></td>
                    <td class="custom__table-heading__general"><span class="catalogue__circle -yes"></span></td>
                    <td class="custom__table-heading__general"></td>
                    <td class="product-catalogue__keys"><span class="product-catalogue__key">K</span></td>
                </tr>"#
            )
        })
        .collect();

    let next_item = match next {
        Next::Link(href) => format!(
            r#"<li class="pagination__item -arrow -next"><a class="pagination__arrow" href="{href}">Next</a></li>"#
        ),
        Next::Script => r##"<li class="pagination__item -arrow -next"><a class="pagination__arrow" href="#">Next</a></li>"##.to_string(),
        Next::Disabled => {
            r#"<li class="pagination__item -arrow -next disabled"><span>Next</span></li>"#.to_string()
        }
        Next::Missing => String::new(),
    };

    format!(
        r#"<html><body>
        <div class="custom__table-wrapper">
            <table>
                <thead><tr>
                    <th class="custom__table-heading__title">{label}</th>
                    <th>Remote Testing</th><th>Adaptive/IRT</th><th>Test Type</th>
                </tr></thead>
                <tbody>{rows}</tbody>
            </table>
        </div>
        <ul class="pagination">
            <li class="pagination__item"><a href="?page=1">1</a></li>
            {next_item}
        </ul>
        </body></html>"#
    )
}

/// A scripted [`BrowserSession`] serving fixed pages by URL.
#[derive(Default)]
pub struct FakeSession {
    pages: HashMap<String, String>,
    /// Page reached by activating the next control on a page.
    clicks: HashMap<String, String>,
    /// Number of activations that go stale before a page's next control works.
    stale_clicks: HashMap<String, usize>,
    current: String,
    pub visited: Vec<String>,
    pub activations: usize,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn with_click(mut self, from: &str, to: &str) -> Self {
        self.clicks.insert(from.to_string(), to.to_string());
        self
    }

    /// Makes one more activation on `from` go stale; call twice for two.
    pub fn with_stale_click(mut self, from: &str) -> Self {
        *self.stale_clicks.entry(from.to_string()).or_default() += 1;
        self
    }
}

impl BrowserSession for FakeSession {
    fn navigate(&mut self, url: &str) -> CrawlerResult<()> {
        if !self.pages.contains_key(url) {
            return Err(CrawlerError::Browser(format!("no page at {url}")));
        }
        self.current = url.to_string();
        self.visited.push(url.to_string());
        Ok(())
    }

    fn content(&mut self) -> CrawlerResult<String> {
        self.pages
            .get(&self.current)
            .cloned()
            .ok_or_else(|| CrawlerError::Browser("nothing loaded".to_string()))
    }

    fn current_url(&mut self) -> CrawlerResult<String> {
        Ok(self.current.clone())
    }

    fn activate(&mut self, _selector: &str, _nth: usize) -> CrawlerResult<()> {
        if let Some(remaining) = self.stale_clicks.get_mut(&self.current)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(CrawlerError::StaleElement("next control detached".to_string()));
        }
        let target = self
            .clicks
            .get(&self.current)
            .cloned()
            .ok_or_else(|| CrawlerError::StaleElement("nothing to click".to_string()))?;
        self.activations += 1;
        self.navigate(&target)
    }
}

/// Bag-of-words embedder over a fixed vocabulary.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            vocabulary: vec![
                "java",
                "python",
                "developer",
                "personality",
                "questionnaire",
                "sales",
                "cognitive",
                "leadership",
            ],
        }
    }
}

impl TextEmbedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let words: Vec<String> = text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .map(str::to_string)
                    .collect();
                let mut vector: Vec<f32> = self
                    .vocabulary
                    .iter()
                    .map(|term| words.iter().filter(|word| word == term).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }
}

pub fn assessment(
    name: &str,
    test_type: &str,
    adaptive_support: bool,
    duration: Option<u32>,
) -> CanonicalAssessment {
    CanonicalAssessment {
        name: name.to_string(),
        url: Some(format!(
            "https://www.shl.com/view/{}/",
            name.to_lowercase().replace(' ', "-")
        )),
        remote_testing: true,
        adaptive_support,
        duration,
        test_type: test_type.to_string(),
    }
}
