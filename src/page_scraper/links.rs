use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use url::Url;

static PRODUCT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(product|item|p|shop|books|phones|computers)")
        .expect("product path pattern should compile")
});

/// Keeps hrefs that are absolute http(s) URLs whose path looks like a
/// product page.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    path_pattern: Regex,
}

impl LinkFilter {
    pub fn products() -> Self {
        LinkFilter {
            path_pattern: PRODUCT_PATH.clone(),
        }
    }

    pub fn accepts(&self, href: &str) -> bool {
        match Url::parse(href) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                self.path_pattern.is_match(url.path())
            }
            _ => false,
        }
    }

    /// Filters and deduplicates. Applying it to its own output is a no-op.
    pub fn apply<I>(&self, hrefs: I) -> BTreeSet<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        hrefs
            .into_iter()
            .map(|href| href.as_ref().trim().to_string())
            .filter(|href| self.accepts(href))
            .collect()
    }
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::products()
    }
}
