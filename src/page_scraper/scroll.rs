use std::time::Duration;

use tokio::time::timeout;

use crate::browser::{BrowserError, PageContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Settled { iterations: u32 },
    CapReached { iterations: u32 },
}

/// Scrolls a page until its height stops changing between two probes.
#[derive(Debug, Clone)]
pub struct ScrollSettler {
    /// Element whose presence suggests a scroll has finished loading.
    pub probe_selector: String,
    pub probe_timeout: Duration,
    /// `None` keeps scrolling for as long as the page keeps growing.
    pub max_iterations: Option<u32>,
}

impl Default for ScrollSettler {
    fn default() -> Self {
        ScrollSettler {
            probe_selector: "footer".to_string(),
            probe_timeout: Duration::from_secs(5),
            max_iterations: Some(50),
        }
    }
}

impl ScrollSettler {
    pub async fn probe<P: PageContext>(&self, page: &P) -> Result<ProbeOutcome, BrowserError> {
        match timeout(self.probe_timeout, page.wait_for_selector(&self.probe_selector)).await {
            Ok(Ok(())) => Ok(ProbeOutcome::Ready),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::debug!(
                    "{} not found within {:?}",
                    self.probe_selector,
                    self.probe_timeout
                );
                Ok(ProbeOutcome::TimedOut)
            }
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn settle<P: PageContext>(&self, page: &P) -> Result<ScrollOutcome, BrowserError> {
        let mut previous = page.scroll_height().await?;
        let mut iterations = 0;
        loop {
            if self.max_iterations.is_some_and(|cap| iterations >= cap) {
                tracing::warn!("Page still growing after {} scrolls", iterations);
                return Ok(ScrollOutcome::CapReached { iterations });
            }
            page.scroll_to_bottom().await?;
            iterations += 1;
            self.probe(page).await?;

            let current = page.scroll_height().await?;
            tracing::debug!(iterations, previous, current, "Scrolled");
            if current == previous {
                return Ok(ScrollOutcome::Settled { iterations });
            }
            previous = current;
        }
    }
}
