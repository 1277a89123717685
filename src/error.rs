use std::time::Duration;

use thiserror::Error;

/// Failures inside a single task. None of these abort a batch run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The browser could not be started or connected.
    #[error("browser session failed: {0}")]
    Browser(String),

    /// The page never loaded or `body` did not appear in time.
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A selector did not resolve within its timeout.
    #[error("no element matched `{selector}` within {timeout:?}")]
    ElementMissing { selector: String, timeout: Duration },

    /// Script evaluation in the page failed.
    #[error("script execution failed: {0}")]
    Script(String),

    /// Anything else that went wrong while handling a task.
    #[error("{0}")]
    Task(String),
}

impl ScrapeError {
    pub fn missing(selector: &str, timeout: Duration) -> Self {
        ScrapeError::ElementMissing {
            selector: selector.to_string(),
            timeout,
        }
    }
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
