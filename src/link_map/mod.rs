use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("could not serialize links: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Product links found per domain. Links from several targets on the same
/// domain are merged, so the result does not depend on completion order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DomainLinks(BTreeMap<String, BTreeSet<String>>);

impl DomainLinks {
    pub fn new() -> Self {
        DomainLinks(BTreeMap::new())
    }

    /// Makes sure `domain` appears in the output even if nothing is found.
    pub fn ensure(&mut self, domain: &str) {
        self.0.entry(domain.to_string()).or_default();
    }

    pub fn merge<I>(&mut self, domain: &str, links: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.0.entry(domain.to_string()).or_default().extend(links);
    }

    pub fn get(&self, domain: &str) -> Option<&BTreeSet<String>> {
        self.0.get(domain)
    }

    pub fn domains(&self) -> usize {
        self.0.len()
    }

    pub fn total_links(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replaces whatever is at `path`.
    pub async fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| PersistError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}
