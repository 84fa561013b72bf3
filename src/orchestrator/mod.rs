use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::{mpsc, Semaphore};
use tracing::Instrument;

use crate::browser::{BrowserError, BrowserSession};
use crate::link_map::DomainLinks;
use crate::page_scraper::{PageScraper, ScrapeOutcome};
use crate::target::Target;

struct Completion {
    target: Target,
    outcome: ScrapeOutcome,
}

/// Runs targets through the scraper with at most `concurrency_limit`
/// scrapes in flight. Targets start in input order as permits free up.
pub struct Orchestrator<S: BrowserSession + 'static> {
    pub scraper: PageScraper<S>,
    pub concurrency_limit: usize,
}

impl<S: BrowserSession + 'static> Orchestrator<S> {
    fn targets(urls: &[String]) -> Vec<Target> {
        urls.iter()
            .filter_map(|url| match Target::parse(url) {
                Ok(target) => Some(target),
                Err(err) => {
                    tracing::warn!("Skipping target: {}", err);
                    None
                }
            })
            .collect()
    }

    #[tracing::instrument(skip_all, fields(targets = urls.len(), limit = self.concurrency_limit))]
    pub async fn run(&self, urls: &[String]) -> DomainLinks {
        let targets = Self::targets(urls);
        let total = targets.len();

        let mut links = DomainLinks::new();
        for target in &targets {
            links.ensure(&target.domain);
        }

        let permits = Arc::new(Semaphore::new(self.concurrency_limit.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

        let dispatch = async move {
            for target in targets {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let scraper = self.scraper.clone();
                let tx = tx.clone();
                let span = tracing::info_span!("target", url = target.url.as_str());
                tokio::spawn(
                    async move {
                        let outcome = scraper.scrape(&target.url).await;
                        drop(permit);
                        // The collector outlives every sender.
                        let _ = tx.send(Completion { target, outcome });
                    }
                    .instrument(span),
                );
            }
        };

        let collect = async {
            let mut completed = 0;
            let mut exhausted = 0;
            while let Some(Completion { target, outcome }) = rx.recv().await {
                completed += 1;
                if outcome.is_exhausted() {
                    exhausted += 1;
                }
                let found = outcome.into_links();
                let count = found.len();
                links.merge(&target.domain, found);
                tracing::info!(
                    completed,
                    total,
                    domain_total = links.get(&target.domain).map_or(0, BTreeSet::len),
                    "Scraped {} product links from {}",
                    count,
                    target.url
                );
            }
            if exhausted > 0 {
                tracing::warn!("{} of {} targets gave up after retrying", exhausted, total);
            }
        };

        tokio::join!(dispatch, collect);
        links
    }

    /// Like `run`, but a browser that went away mid-run is an error rather
    /// than a map of empty domains.
    pub async fn run_to_completion(&self, urls: &[String]) -> Result<DomainLinks, BrowserError> {
        let links = self.run(urls).await;
        if !self.scraper.session.is_connected() {
            return Err(BrowserError::Closed(
                "browser exited before the run finished".to_string(),
            ));
        }
        Ok(links)
    }
}
