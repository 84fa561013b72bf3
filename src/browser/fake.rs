//! Scripted in-memory browser for tests.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::sleep;
use tracing_subscriber::fmt::MakeWriter;

use super::{BrowserError, BrowserSession, PageContext};

#[derive(Clone, Debug)]
pub struct FakeSite {
    pub hrefs: Vec<String>,
    /// Successive `scroll_height` readings; the last one repeats.
    pub heights: Vec<u64>,
    pub footer: bool,
    /// Navigations that fail before one succeeds.
    pub failures: u32,
    pub delay: Duration,
}

impl FakeSite {
    pub fn with_links(hrefs: &[&str]) -> Self {
        FakeSite {
            hrefs: hrefs.iter().map(|href| href.to_string()).collect(),
            heights: vec![1000],
            footer: true,
            failures: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        FakeSite {
            failures: u32::MAX,
            ..FakeSite::with_links(&[])
        }
    }
}

#[derive(Default)]
struct State {
    sites: HashMap<String, FakeSite>,
    navigations: HashMap<String, u32>,
    visited: Vec<String>,
    opened: u32,
    closed: u32,
    open: usize,
    peak_open: usize,
    disconnected: bool,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<State>>,
}

impl FakeBrowser {
    pub fn new(sites: Vec<(&str, FakeSite)>) -> Self {
        let browser = FakeBrowser::default();
        browser.state.lock().unwrap().sites = sites
            .into_iter()
            .map(|(url, site)| (url.to_string(), site))
            .collect();
        browser
    }

    pub fn navigations(&self, url: &str) -> u32 {
        *self.state.lock().unwrap().navigations.get(url).unwrap_or(&0)
    }

    /// URLs in the order navigation started.
    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn opened(&self) -> u32 {
        self.state.lock().unwrap().opened
    }

    pub fn closed(&self) -> u32 {
        self.state.lock().unwrap().closed
    }

    pub fn peak_open(&self) -> usize {
        self.state.lock().unwrap().peak_open
    }

    /// Simulates the browser process going away; later pages fail to open.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }
}

impl BrowserSession for FakeBrowser {
    type Page = FakePage;

    fn is_connected(&self) -> bool {
        !self.state.lock().unwrap().disconnected
    }

    async fn open_page(&self) -> Result<FakePage, BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(BrowserError::Page("connection closed".to_string()));
        }
        state.opened += 1;
        state.open += 1;
        state.peak_open = state.peak_open.max(state.open);
        Ok(FakePage {
            browser: self.clone(),
            loaded: Mutex::new(None),
            probe: Mutex::new(0),
            scrolls: Mutex::new(0),
        })
    }
}

pub struct FakePage {
    browser: FakeBrowser,
    loaded: Mutex<Option<FakeSite>>,
    probe: Mutex<usize>,
    scrolls: Mutex<u32>,
}

impl FakePage {
    /// A page already showing `site`, for driving the scroll loop directly.
    pub fn showing(site: FakeSite) -> Self {
        FakePage {
            browser: FakeBrowser::default(),
            loaded: Mutex::new(Some(site)),
            probe: Mutex::new(0),
            scrolls: Mutex::new(0),
        }
    }

    pub fn scrolls(&self) -> u32 {
        *self.scrolls.lock().unwrap()
    }

    fn site(&self) -> Result<FakeSite, BrowserError> {
        self.loaded
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BrowserError::Evaluation("nothing loaded".to_string()))
    }
}

impl PageContext for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let (site, attempt) = {
            let mut state = self.browser.state.lock().unwrap();
            state.visited.push(url.to_string());
            let attempt = state.navigations.entry(url.to_string()).or_insert(0);
            *attempt += 1;
            let attempt = *attempt;
            (state.sites.get(url).cloned(), attempt)
        };
        let site = site.ok_or_else(|| {
            BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string())
        })?;
        sleep(site.delay).await;
        if attempt <= site.failures {
            return Err(BrowserError::Navigation(
                "net::ERR_CONNECTION_RESET".to_string(),
            ));
        }
        *self.loaded.lock().unwrap() = Some(site);
        Ok(())
    }

    async fn scroll_height(&self) -> Result<u64, BrowserError> {
        let site = self.site()?;
        let mut probe = self.probe.lock().unwrap();
        let height = site
            .heights
            .get(*probe)
            .or(site.heights.last())
            .copied()
            .unwrap_or(0);
        *probe += 1;
        Ok(height)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.site()?;
        *self.scrolls.lock().unwrap() += 1;
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str) -> Result<(), BrowserError> {
        if self.site()?.footer {
            Ok(())
        } else {
            std::future::pending::<Result<(), BrowserError>>().await
        }
    }

    async fn anchor_hrefs(&self) -> Result<Vec<String>, BrowserError> {
        Ok(self.site()?.hrefs)
    }

    async fn close(self) -> Result<(), BrowserError> {
        let mut state = self.browser.state.lock().unwrap();
        state.closed += 1;
        state.open -= 1;
        Ok(())
    }
}

/// Collects formatted log output so tests can assert on console lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Installs a plain-text subscriber writing here for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
