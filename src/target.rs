use std::path::Path;

use thiserror::Error;
use url::Url;

pub const DEFAULT_TARGETS: [&str; 13] = [
    "https://webscraper.io/test-sites/e-commerce/allinone/computers",
    "https://webscraper.io/test-sites/e-commerce/allinone/phones",
    "https://demo.opencart.com",
    "https://books.toscrape.com",
    "https://scrapeme.live/shop",
    "https://fakestoreapi.com",
    "https://webscraper.io/test-sites/e-commerce/static",
    "https://www.techproducts.com",
    "https://www.samsung.com/us/",
    "https://www.walmart.com",
    "https://www.nike.com",
    "https://www.target.com/c/toys/-/N-5xt9n",
    "https://www.ikea.com/us/en/",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("{url} is not a valid URL: {source}")]
    Invalid {
        url: String,
        source: url::ParseError,
    },
    #[error("{0} has no host")]
    MissingHost(String),
}

/// One URL to scrape together with the domain its links are filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: String,
    pub domain: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let url = raw.trim().to_string();
        let domain = domain(&url)?;
        Ok(Target { url, domain })
    }
}

/// Host component of `url`, without port.
pub fn domain(url: &str) -> Result<String, TargetError> {
    let parsed = Url::parse(url).map_err(|source| TargetError::Invalid {
        url: url.to_string(),
        source,
    })?;
    match parsed.host_str() {
        Some(host) => Ok(host.to_string()),
        None => Err(TargetError::MissingHost(url.to_string())),
    }
}

/// One URL per line. Blank lines and `#` comments are skipped.
pub fn parse_target_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn load_target_list(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(parse_target_list(&contents))
}

pub fn default_targets() -> Vec<String> {
    DEFAULT_TARGETS.iter().map(|url| url.to_string()).collect()
}
