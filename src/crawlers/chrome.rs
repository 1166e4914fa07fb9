//! [`BrowserSession`] backed by a headless Chromium instance.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};

use crate::crawlers::{BrowserSession, CrawlerError, CrawlerResult};

const CLICK_FN: &str = r#"
    function activate() {
        this.scrollIntoView({ behavior: 'auto', block: 'center', inline: 'center' });
        this.click();
    }
"#;

/// Launch settings for [`ChromeSession`].
#[derive(Clone, Debug)]
pub struct ChromeOptions {
    pub headless: bool,
    /// Browser binary; `None` lets `headless_chrome` find or fetch one.
    pub chrome_path: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
    /// Bound on navigations and element lookups inside the browser.
    pub navigation_timeout: Duration,
    /// How long the browser may go without DevTools events before it is
    /// considered dead.
    pub idle_timeout: Duration,
}

/// One browser with one tab.
///
/// Dropping the session closes the tab and terminates the browser
/// process, whichever way the scrape ends.
pub struct ChromeSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromeSession {
    pub fn launch(options: &ChromeOptions) -> CrawlerResult<Self> {
        let launch_options = LaunchOptionsBuilder::default()
            .headless(options.headless)
            .sandbox(false)
            .window_size(Some(options.window_size))
            .path(options.chrome_path.clone())
            .idle_browser_timeout(options.idle_timeout)
            .build()
            .map_err(|e| CrawlerError::Launch(e.to_string()))?;

        let browser = Browser::new(launch_options).map_err(|e| CrawlerError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CrawlerError::Launch(e.to_string()))?;
        tab.set_default_timeout(options.navigation_timeout);

        if let Some(user_agent) = &options.user_agent {
            tab.set_user_agent(user_agent, Some("en-US,en"), None)
                .map_err(|e| CrawlerError::Launch(e.to_string()))?;
        }

        log::info!("Browser session started");
        Ok(Self {
            tab,
            _browser: browser,
        })
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> CrawlerResult<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(browser_error)
    }

    fn content(&mut self) -> CrawlerResult<String> {
        self.tab.get_content().map_err(browser_error)
    }

    fn current_url(&mut self) -> CrawlerResult<String> {
        Ok(self.tab.get_url())
    }

    fn activate(&mut self, selector: &str, nth: usize) -> CrawlerResult<()> {
        let elements = self
            .tab
            .find_elements(selector)
            .map_err(|e| CrawlerError::StaleElement(format!("{selector}: {e}")))?;
        let element = elements.get(nth).ok_or_else(|| {
            CrawlerError::StaleElement(format!(
                "{selector} #{nth} no longer exists, {} found",
                elements.len()
            ))
        })?;

        element
            .call_js_fn(CLICK_FN, vec![], false)
            .map(|_| ())
            .map_err(browser_error)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            log::debug!("Failed to close browser tab: {e}");
        }
        log::info!("Browser session closed");
    }
}

/// DevTools reports nodes removed by a re-render with these messages.
const STALE_MARKERS: [&str; 3] = ["No node with given id", "Could not find node", "stale"];

fn browser_error(error: impl Display) -> CrawlerError {
    let message = error.to_string();
    if STALE_MARKERS.iter().any(|marker| message.contains(marker)) {
        CrawlerError::StaleElement(message)
    } else {
        CrawlerError::Browser(message)
    }
}
