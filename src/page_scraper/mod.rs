use std::{collections::BTreeSet, time::Duration};

use tokio::time::timeout;

use crate::browser::{BrowserError, BrowserSession, PageContext};

pub mod links;
pub mod scroll;

pub use links::LinkFilter;
pub use scroll::{ScrollOutcome, ScrollSettler};

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Scraped(BTreeSet<String>),
    /// Every attempt failed; `error` is the last one seen.
    Exhausted { attempts: u8, error: BrowserError },
}

impl ScrapeOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ScrapeOutcome::Exhausted { .. })
    }

    /// Links found, empty when every attempt failed.
    pub fn into_links(self) -> BTreeSet<String> {
        match self {
            ScrapeOutcome::Scraped(links) => links,
            ScrapeOutcome::Exhausted { .. } => BTreeSet::new(),
        }
    }
}

/// Loads a page, scrolls it until it settles and keeps the product links,
/// retrying immediately on failure.
#[derive(Clone)]
pub struct PageScraper<S: BrowserSession> {
    pub session: S,
    /// Total attempts per URL. Zero is treated as one.
    pub max_retries: u8,
    pub navigation_timeout: Duration,
    pub settler: ScrollSettler,
    pub filter: LinkFilter,
}

impl<S: BrowserSession> PageScraper<S> {
    pub fn new(session: S) -> Self {
        PageScraper {
            session,
            max_retries: 3,
            navigation_timeout: Duration::from_secs(120),
            settler: ScrollSettler::default(),
            filter: LinkFilter::products(),
        }
    }

    async fn extract(&self, page: &S::Page, url: &str) -> Result<BTreeSet<String>, BrowserError> {
        match timeout(self.navigation_timeout, page.navigate(url)).await {
            Ok(navigated) => navigated?,
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {} took longer than {:?}",
                    url, self.navigation_timeout
                )))
            }
        }
        if let ScrollOutcome::CapReached { iterations } = self.settler.settle(page).await? {
            tracing::warn!("Extracting from {} before it settled ({} scrolls)", url, iterations);
        }
        let hrefs = page.anchor_hrefs().await?;
        tracing::debug!("Found {} anchors", hrefs.len());
        Ok(self.filter.apply(hrefs))
    }

    async fn attempt(&self, url: &str) -> Result<BTreeSet<String>, BrowserError> {
        let page = self.session.open_page().await?;
        let result = self.extract(&page, url).await;
        if let Err(err) = page.close().await {
            tracing::debug!("Failed to close page: {}", err);
        }
        result
    }

    #[tracing::instrument(skip(self))]
    pub async fn scrape(&self, url: &str) -> ScrapeOutcome {
        let attempts = self.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(url).await {
                Ok(links) => return ScrapeOutcome::Scraped(links),
                Err(error) if attempt >= attempts => {
                    tracing::error!("Error scraping {}: {}", url, error);
                    return ScrapeOutcome::Exhausted {
                        attempts: attempt,
                        error,
                    };
                }
                Err(error) => {
                    tracing::debug!(attempt, "Attempt failed: {}", error);
                    attempt += 1;
                }
            }
        }
    }
}
