//! Headless Chromium sessions over the DevTools protocol.
//!
//! Every call to [`ChromeProvider::open`] launches its own browser process
//! with a throwaway profile directory. The process is shut down by
//! [`PageAccessor::close`]; if a session is dropped without being closed
//! (panic, early return) chromiumoxide kills the child process on drop and
//! the handler task is aborted here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{PageAccessor, PageProvider};
use crate::config::BrowserSettings;
use crate::error::{ScrapeError, ScrapeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const IS_VISIBLE_JS: &str = r#"function() {
    if (!this.isConnected) return false;
    const style = window.getComputedStyle(this);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

// Element-scoped queries only see descendants, so sibling lookups tag the
// element and run a document-wide selector against the tag instead.
const ANCHOR_ATTR: &str = "data-recipe-scraper-anchor";
static ANCHOR_SEQ: AtomicU64 = AtomicU64::new(0);

fn sibling_selector(anchor: &str, tag: &str) -> String {
    format!("[{}=\"{}\"] ~ {}", ANCHOR_ATTR, anchor, tag)
}

pub struct ChromeProvider {
    settings: BrowserSettings,
}

impl ChromeProvider {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self, profile: &TempDir) -> ScrapeResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.window_width, self.settings.window_height)
            .user_data_dir(profile.path())
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        // with_head means NOT headless
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref exe) = self.settings.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(ScrapeError::Browser)
    }

    async fn launch(&self) -> ScrapeResult<BrowserGuard> {
        let profile = tempfile::Builder::new()
            .prefix("recipe-scraper-")
            .tempdir()
            .map_err(|e| ScrapeError::Browser(format!("profile dir: {}", e)))?;
        let config = self.browser_config(&profile)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserGuard {
            browser: Some(browser),
            handler,
            _profile: profile,
        })
    }
}

#[async_trait]
impl PageProvider for ChromeProvider {
    type Page = ChromeSession;

    async fn open(&self, url: &str, timeout: Duration) -> ScrapeResult<ChromeSession> {
        let mut guard = self.launch().await?;
        let browser = guard
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("browser already closed".into()))?;

        let navigation = async {
            let page = browser.new_page(url).await?;
            loop {
                if page.find_element("body").await.is_ok() {
                    return Ok::<Page, chromiumoxide::error::CdpError>(page);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        let navigated = tokio::time::timeout(timeout, navigation).await;

        let reason = match navigated {
            Ok(Ok(page)) => {
                debug!("Loaded {}", url);
                return Ok(ChromeSession { page, guard });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("body not present after {:?}", timeout),
        };
        if let Err(e) = guard.shutdown().await {
            debug!("Closing browser after failed navigation: {}", e);
        }
        Err(ScrapeError::Navigation {
            url: url.to_string(),
            reason,
        })
    }
}

/// Owns the browser process, its event loop and its profile directory.
struct BrowserGuard {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserGuard {
    async fn shutdown(&mut self) -> ScrapeResult<()> {
        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                if let Err(e) = browser.wait().await {
                    warn!("Browser process did not exit cleanly: {}", e);
                }
                closed.map_err(|e| ScrapeError::Browser(e.to_string()))
            }
            None => Ok(()),
        };
        self.handler.abort();
        result
    }
}

impl Drop for BrowserGuard {
    fn drop(&mut self) {
        self.handler.abort();
        if self.browser.is_some() {
            debug!("Browser session dropped without close; killing process");
        }
    }
}

/// One browser process with one tab.
pub struct ChromeSession {
    page: Page,
    guard: BrowserGuard,
}

fn cdp_err(e: chromiumoxide::error::CdpError) -> ScrapeError {
    ScrapeError::Task(e.to_string())
}

#[async_trait]
impl PageAccessor for ChromeSession {
    type Element = Element;

    async fn query_one(&self, selector: &str, timeout: Duration) -> ScrapeResult<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::missing(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_all(&self, selector: &str) -> ScrapeResult<Vec<Element>> {
        self.page.find_elements(selector).await.map_err(cdp_err)
    }

    async fn query_within(&self, parent: &Element, selector: &str) -> ScrapeResult<Vec<Element>> {
        parent.find_elements(selector).await.map_err(cdp_err)
    }

    async fn following_sibling(&self, element: &Element, tag: &str) -> ScrapeResult<Option<Element>> {
        let anchor = ANCHOR_SEQ.fetch_add(1, Ordering::Relaxed).to_string();
        let mark = format!(
            "function() {{ this.setAttribute('{}', '{}'); }}",
            ANCHOR_ATTR, anchor
        );
        self.run_script(&mark, element).await?;

        let siblings = self
            .page
            .find_elements(sibling_selector(&anchor, tag))
            .await;

        let unmark = format!("function() {{ this.removeAttribute('{}'); }}", ANCHOR_ATTR);
        if let Err(e) = self.run_script(&unmark, element).await {
            debug!("Leaving sibling anchor {} in place: {}", anchor, e);
        }
        Ok(siblings.map_err(cdp_err)?.into_iter().next())
    }

    async fn text_of(&self, element: &Element) -> ScrapeResult<String> {
        let text = element.inner_text().await.map_err(cdp_err)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute_of(&self, element: &Element, name: &str) -> ScrapeResult<Option<String>> {
        element.attribute(name).await.map_err(cdp_err)
    }

    async fn is_visible(&self, element: &Element) -> ScrapeResult<bool> {
        let ret = element
            .call_js_fn(IS_VISIBLE_JS, false)
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn run_script(&self, function: &str, element: &Element) -> ScrapeResult<()> {
        let ret = element
            .call_js_fn(function, false)
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?;
        match ret.exception_details {
            Some(details) => Err(ScrapeError::Script(details.text)),
            None => Ok(()),
        }
    }

    async fn close(mut self) -> ScrapeResult<()> {
        self.guard.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;
    use crate::config::BrowserSettings;
    use crate::extract::{self, selectors};
    use crate::record::NutrientPair;

    const T: Duration = Duration::from_secs(5);

    fn fixture_url(name: &str) -> String {
        let path = std::fs::canonicalize(format!("tests/fixtures/{}.html", name)).unwrap();
        format!("file://{}", path.display())
    }

    #[test]
    fn sibling_selector_matches_next_cell_document_wide() {
        let html = r#"<table><tr>
            <td data-recipe-scraper-anchor="7"><span>Total Fat</span> 14g</td>
            <td>18%</td><td>other</td>
        </tr><tr><td><span>Sodium</span> 320mg</td><td>14%</td></tr></table>"#;
        let doc = Html::parse_document(html);
        let sel = Selector::parse(&sibling_selector("7", "td")).unwrap();
        let texts: Vec<String> = doc.select(&sel).map(|el| el.text().collect()).collect();
        assert_eq!(texts, vec!["18%", "other"]);
    }

    #[test]
    fn sibling_selector_is_per_anchor() {
        assert_ne!(sibling_selector("1", "div"), sibling_selector("2", "div"));
        assert!(sibling_selector("3", "div").ends_with("~ div"));
    }

    // The tests below need a local Chrome/Chromium: cargo test -- --ignored

    #[tokio::test]
    #[ignore]
    async fn live_details_and_visibility() {
        let provider = ChromeProvider::new(BrowserSettings::default());
        let page = provider.open(&fixture_url("cake"), T).await.unwrap();

        assert_eq!(
            extract::labelled_field(&page, selectors::PREP_TIME, T).await,
            "20 mins"
        );
        assert_eq!(extract::labelled_field(&page, selectors::SERVINGS, T).await, "12");

        let title = page.query_one(selectors::RECIPE_TITLE, T).await.unwrap();
        assert!(page.is_visible(&title).await.unwrap());
        // The anchor attribute is removed after the lookup.
        assert!(page.query_all(&format!("[{}]", ANCHOR_ATTR)).await.unwrap().is_empty());

        let toggle = page.query_one(selectors::NUTRITION_TOGGLE, T).await.unwrap();
        page.run_script("function() { this.click(); }", &toggle)
            .await
            .unwrap();
        assert!(matches!(
            page.run_script("function() { throw new Error('boom'); }", &toggle)
                .await,
            Err(ScrapeError::Script(_))
        ));
        page.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn live_nutrient_pairs() {
        let provider = ChromeProvider::new(BrowserSettings::default());
        let page = provider.open(&fixture_url("cake_nutrition"), T).await.unwrap();

        assert_eq!(
            extract::nutrient_pair(&page, "Total Fat").await,
            NutrientPair {
                weight: "14g".into(),
                percent: "18%".into()
            }
        );
        assert_eq!(
            extract::nutrient_pair(&page, "Total Sugars").await,
            NutrientPair::default()
        );
        page.close().await.unwrap();
    }
}
