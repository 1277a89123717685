pub mod chrome;
pub mod snapshot;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeResult;

/// DOM access for one loaded page.
///
/// Zero matches is never an error for the multi-element queries; errors are
/// reserved for transport or selector failures. Callers that need totality
/// (the extractors) fold errors into their defaults.
#[async_trait]
pub trait PageAccessor: Send + Sync {
    type Element: Send + Sync;

    /// First match, waiting up to `timeout` for it to appear.
    async fn query_one(&self, selector: &str, timeout: Duration) -> ScrapeResult<Self::Element>;

    async fn query_all(&self, selector: &str) -> ScrapeResult<Vec<Self::Element>>;

    /// Descendants of `parent` matching `selector`.
    async fn query_within(
        &self,
        parent: &Self::Element,
        selector: &str,
    ) -> ScrapeResult<Vec<Self::Element>>;

    /// First later sibling of `element` with the given tag name.
    async fn following_sibling(
        &self,
        element: &Self::Element,
        tag: &str,
    ) -> ScrapeResult<Option<Self::Element>>;

    /// Rendered text, trimmed.
    async fn text_of(&self, element: &Self::Element) -> ScrapeResult<String>;

    async fn attribute_of(&self, element: &Self::Element, name: &str)
        -> ScrapeResult<Option<String>>;

    async fn is_visible(&self, element: &Self::Element) -> ScrapeResult<bool>;

    /// Call a JS function declaration with `this` bound to `element`.
    async fn run_script(&self, function: &str, element: &Self::Element) -> ScrapeResult<()>;

    /// Release the underlying session.
    async fn close(self) -> ScrapeResult<()>;
}

/// Opens one fresh, exclusively owned page session per call.
#[async_trait]
pub trait PageProvider: Send + Sync {
    type Page: PageAccessor + 'static;

    /// Navigate to `url` and wait until `body` exists. Fails with
    /// `ScrapeError::Navigation` when that does not happen within `timeout`.
    async fn open(&self, url: &str, timeout: Duration) -> ScrapeResult<Self::Page>;
}
