use std::{path::PathBuf, sync::Arc, time::Duration};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use scraper::{Html, Selector};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use url::Url;

use super::{BrowserError, BrowserSession, PageContext};

const DOM_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState !== 'loading') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
        }
    })
"#;

const SCROLL_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub headful: bool,
}

#[derive(Clone)]
pub struct ChromiumSession {
    browser: Arc<Mutex<Browser>>,
    handler: Arc<JoinHandle<()>>,
}

impl ChromiumSession {
    #[tracing::instrument]
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        if options.headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    // chromiumoxide reports CDP events it cannot deserialize here
                    tracing::trace!("browser handler: {}", err);
                }
            }
            tracing::debug!("Browser handler finished");
        });
        tracing::info!("Browser launched");

        Ok(ChromiumSession {
            browser: Arc::new(Mutex::new(browser)),
            handler: Arc::new(handler),
        })
    }

    /// Closes the browser. Fails if it had already gone away before this
    /// call or could not be closed.
    pub async fn shutdown(self) -> Result<(), BrowserError> {
        let lost = !self.is_connected();
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        if let Err(err) = browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", err);
        }
        self.handler.abort();
        if lost {
            return Err(BrowserError::Closed(
                "browser exited before the run finished".to_string(),
            ));
        }
        closed.map_err(|err| BrowserError::Closed(err.to_string()))?;
        tracing::info!("Browser closed");
        Ok(())
    }
}

impl BrowserSession for ChromiumSession {
    type Page = ChromiumPage;

    fn is_connected(&self) -> bool {
        // The handler stream ends when the CDP connection drops.
        !self.handler.is_finished()
    }

    async fn open_page(&self) -> Result<ChromiumPage, BrowserError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| BrowserError::Page(err.to_string()))?;
        Ok(ChromiumPage { page })
    }
}

pub struct ChromiumPage {
    page: Page,
}

fn evaluation_error(err: impl ToString) -> BrowserError {
    BrowserError::Evaluation(err.to_string())
}

impl PageContext for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Navigation)?;
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|err| BrowserError::Navigation(err.to_string()))?;
        if let Some(error_text) = &response.result.error_text {
            return Err(BrowserError::Navigation(error_text.clone()));
        }
        self.page
            .evaluate(DOM_READY_SCRIPT)
            .await
            .map_err(evaluation_error)?;
        Ok(())
    }

    async fn scroll_height(&self) -> Result<u64, BrowserError> {
        self.page
            .evaluate(SCROLL_HEIGHT_SCRIPT)
            .await
            .map_err(evaluation_error)?
            .into_value::<u64>()
            .map_err(evaluation_error)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM_SCRIPT)
            .await
            .map_err(evaluation_error)?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), BrowserError> {
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    tracing::trace!("{} not present yet: {}", selector, err);
                    sleep(SELECTOR_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn anchor_hrefs(&self) -> Result<Vec<String>, BrowserError> {
        let html = self.page.content().await.map_err(evaluation_error)?;
        let page_url = self
            .page
            .url()
            .await
            .map_err(evaluation_error)?
            .and_then(|url| Url::parse(&url).ok());
        Ok(hrefs_from_html(&html, page_url.as_ref()))
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|err| BrowserError::Closed(err.to_string()))
    }
}

/// Collects anchor hrefs from a document. Relative hrefs are resolved the
/// way the DOM resolves `a.href`: against the first `<base href>`, itself
/// resolved against the page URL. With no usable base they are kept raw.
pub fn hrefs_from_html(html: &str, page_url: Option<&Url>) -> Vec<String> {
    let document = Html::parse_document(html);
    let (anchors, bases) = match (Selector::parse("a[href]"), Selector::parse("base[href]")) {
        (Ok(anchors), Ok(bases)) => (anchors, bases),
        _ => return vec![],
    };
    let declared = document
        .select(&bases)
        .next()
        .and_then(|base| base.attr("href"))
        .map(str::trim)
        .and_then(|href| match page_url {
            Some(page_url) => page_url.join(href).ok(),
            None => Url::parse(href).ok(),
        });
    let base = declared.as_ref().or(page_url);

    document
        .select(&anchors)
        .filter_map(|anchor| anchor.attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| match base.map(|base| base.join(href)) {
            Some(Ok(resolved)) => resolved.to_string(),
            _ => href.to_string(),
        })
        .collect()
}
