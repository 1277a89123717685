//! Static HTML pages without a browser.
//!
//! The document is kept as source text and re-parsed per query; elements are
//! addressed by their child-index path from the root, which is stable across
//! parses of the same text. There is no JS engine: `run_script` only records
//! the call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{PageAccessor, PageProvider};
use crate::error::{ScrapeError, ScrapeResult};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HIDDEN_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

/// Child-index path from the document root to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath(Vec<usize>);

pub struct SnapshotPage {
    html: String,
    scripts: Mutex<Vec<String>>,
    live: Option<Arc<AtomicUsize>>,
}

impl SnapshotPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            scripts: Mutex::new(Vec::new()),
            live: None,
        }
    }

    /// Script bodies passed to `run_script`, in call order.
    #[cfg(test)]
    pub fn scripts_run(&self) -> Vec<String> {
        self.scripts
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn with_dom<R>(&self, f: impl FnOnce(&Html) -> R) -> R {
        let doc = Html::parse_document(&self.html);
        f(&doc)
    }

    fn with_element<R>(
        &self,
        path: &NodePath,
        f: impl FnOnce(ElementRef<'_>) -> R,
    ) -> ScrapeResult<R> {
        self.with_dom(|doc| {
            let element = resolve(doc, path)
                .ok_or_else(|| ScrapeError::Task(format!("stale element {:?}", path)))?;
            Ok(f(element))
        })
    }
}

impl Drop for SnapshotPage {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn parse_selector(selector: &str) -> ScrapeResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Task(format!("invalid selector `{}`: {:?}", selector, e)))
}

fn resolve<'a>(doc: &'a Html, path: &NodePath) -> Option<ElementRef<'a>> {
    let mut node = doc.tree.root();
    for &idx in &path.0 {
        node = node.children().nth(idx)?;
    }
    ElementRef::wrap(node)
}

fn path_of(element: ElementRef<'_>) -> NodePath {
    let mut path = Vec::new();
    let mut node = *element;
    while let Some(parent) = node.parent() {
        path.push(node.prev_siblings().count());
        node = parent;
    }
    path.reverse();
    NodePath(path)
}

fn normalized_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    WHITESPACE_RE.replace_all(&raw, " ").trim().to_string()
}

fn hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.attr("hidden").is_some()
        || value
            .attr("style")
            .is_some_and(|style| HIDDEN_STYLE_RE.is_match(style))
}

#[async_trait]
impl PageAccessor for SnapshotPage {
    type Element = NodePath;

    async fn query_one(&self, selector: &str, timeout: Duration) -> ScrapeResult<NodePath> {
        let sel = parse_selector(selector)?;
        self.with_dom(|doc| doc.select(&sel).next().map(path_of))
            .ok_or_else(|| ScrapeError::missing(selector, timeout))
    }

    async fn query_all(&self, selector: &str) -> ScrapeResult<Vec<NodePath>> {
        let sel = parse_selector(selector)?;
        Ok(self.with_dom(|doc| doc.select(&sel).map(path_of).collect()))
    }

    async fn query_within(&self, parent: &NodePath, selector: &str) -> ScrapeResult<Vec<NodePath>> {
        let sel = parse_selector(selector)?;
        self.with_element(parent, |el| el.select(&sel).map(path_of).collect())
    }

    async fn following_sibling(&self, element: &NodePath, tag: &str) -> ScrapeResult<Option<NodePath>> {
        self.with_element(element, |el| {
            (*el)
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sib| sib.value().name().eq_ignore_ascii_case(tag))
                .map(path_of)
        })
    }

    async fn text_of(&self, element: &NodePath) -> ScrapeResult<String> {
        self.with_element(element, normalized_text)
    }

    async fn attribute_of(&self, element: &NodePath, name: &str) -> ScrapeResult<Option<String>> {
        self.with_element(element, |el| el.value().attr(name).map(str::to_string))
    }

    async fn is_visible(&self, element: &NodePath) -> ScrapeResult<bool> {
        self.with_element(element, |el| {
            !hidden(el) && !(*el).ancestors().filter_map(ElementRef::wrap).any(hidden)
        })
    }

    async fn run_script(&self, function: &str, element: &NodePath) -> ScrapeResult<()> {
        self.with_element(element, |_| ())?;
        self.scripts
            .lock()
            .map_err(|_| ScrapeError::Script("script log poisoned".into()))?
            .push(function.to_string());
        Ok(())
    }

    async fn close(self) -> ScrapeResult<()> {
        Ok(())
    }
}

/// A fixed set of pages keyed by URL. Unknown URLs fail navigation.
#[derive(Default)]
pub struct SnapshotSite {
    pages: HashMap<String, String>,
    live: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl SnapshotSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Sessions opened and not yet released.
    #[cfg(test)]
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageProvider for SnapshotSite {
    type Page = SnapshotPage;

    async fn open(&self, url: &str, timeout: Duration) -> ScrapeResult<SnapshotPage> {
        let html = self.pages.get(url).ok_or_else(|| ScrapeError::Navigation {
            url: url.to_string(),
            reason: "no such page".into(),
        })?;
        let mut page = SnapshotPage::new(html.clone());
        page.query_one("body", timeout)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        page.live = Some(Arc::clone(&self.live));
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<html><body>
        <div id="a" class="x">  Hello
            <span>world</span> </div>
        <div hidden><p class="inner">secret</p></div>
        <table><tr><td class="k"><span>Sodium</span> 320mg</td><td>14%</td></tr></table>
        <img class="pic" data-src="one.jpg">
    </body></html>"#;

    #[tokio::test]
    async fn text_is_whitespace_normalized() {
        let page = SnapshotPage::new(DOC);
        let el = page.query_one("#a", Duration::ZERO).await.unwrap();
        assert_eq!(page.text_of(&el).await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn zero_matches_is_empty_not_error() {
        let page = SnapshotPage::new(DOC);
        assert!(page.query_all("ul.nothing li").await.unwrap().is_empty());
        assert!(matches!(
            page.query_one("ul.nothing", Duration::ZERO).await,
            Err(ScrapeError::ElementMissing { .. })
        ));
    }

    #[tokio::test]
    async fn visibility_follows_ancestors() {
        let page = SnapshotPage::new(DOC);
        let shown = page.query_one("#a", Duration::ZERO).await.unwrap();
        let inner = page.query_one("p.inner", Duration::ZERO).await.unwrap();
        assert!(page.is_visible(&shown).await.unwrap());
        assert!(!page.is_visible(&inner).await.unwrap());
    }

    #[tokio::test]
    async fn sibling_and_attribute_lookup() {
        let page = SnapshotPage::new(DOC);
        let cell = page.query_one("td.k", Duration::ZERO).await.unwrap();
        let next = page.following_sibling(&cell, "td").await.unwrap().unwrap();
        assert_eq!(page.text_of(&next).await.unwrap(), "14%");
        let spans = page.query_within(&cell, "span").await.unwrap();
        assert_eq!(spans.len(), 1);

        let img = page.query_one("img.pic", Duration::ZERO).await.unwrap();
        assert_eq!(
            page.attribute_of(&img, "data-src").await.unwrap().as_deref(),
            Some("one.jpg")
        );
        assert_eq!(page.attribute_of(&img, "src").await.unwrap(), None);
    }

    #[tokio::test]
    async fn site_tracks_sessions() {
        let site = SnapshotSite::new().with_page("https://x.test/", DOC);
        let page = site.open("https://x.test/", Duration::ZERO).await.unwrap();
        assert_eq!(site.live_sessions(), 1);
        page.close().await.unwrap();
        assert_eq!(site.live_sessions(), 0);
        assert_eq!(site.sessions_opened(), 1);

        let err = site.open("https://x.test/missing", Duration::ZERO).await;
        assert!(matches!(err, Err(ScrapeError::Navigation { .. })));
    }
}
