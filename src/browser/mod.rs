use std::future::Future;

use thiserror::Error;

mod chromium;
#[cfg(test)]
pub mod fake;

pub use chromium::{ChromiumSession, LaunchOptions};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("could not open page: {0}")]
    Page(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("browser closed: {0}")]
    Closed(String),
}

/// A running browser that hands out isolated page contexts.
///
/// Cloning is cheap and every clone talks to the same browser, so workers
/// each take their own handle.
pub trait BrowserSession: Send + Sync + Clone {
    type Page: PageContext;

    /// False once the browser process or its connection has gone away.
    fn is_connected(&self) -> bool;

    fn open_page(&self) -> impl Future<Output = Result<Self::Page, BrowserError>> + Send;
}

/// One tab. Page contexts share no mutable state with each other.
pub trait PageContext: Send + Sync + Sized {
    /// Navigates and returns once the DOM has been constructed.
    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), BrowserError>> + Send;

    fn scroll_height(&self) -> impl Future<Output = Result<u64, BrowserError>> + Send;

    fn scroll_to_bottom(&self) -> impl Future<Output = Result<(), BrowserError>> + Send;

    /// Resolves once `selector` matches an element. Never gives up on its own,
    /// callers bound it with a timeout.
    fn wait_for_selector(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<(), BrowserError>> + Send;

    /// Every anchor `href` in the document, resolved against the page URL.
    fn anchor_hrefs(&self) -> impl Future<Output = Result<Vec<String>, BrowserError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), BrowserError>> + Send;
}
