//! Directory-backed provider
//!
//! Layout:
//!
//! ```text
//! <spool>/blocks/<height>.json        ChainBlock
//! <spool>/committee.json              {"height": N, "members": {address: [stake, is_open, commission]}}
//! <spool>/transactions/<height>.json  [Transaction]
//! ```
//!
//! A missing file means "not available yet" and is not an error. A file
//! that exists but does not parse is a `Json` error.

use super::{ChainBlock, ChainDataProvider, Transaction};
use crate::error::{MonitorError, MonitorResult};
use crate::model::Committee;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CommitteeFile {
    height: i64,
    members: Committee,
}

pub struct SpoolProvider {
    root: PathBuf,
}

impl SpoolProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> MonitorResult<Option<T>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Highest `<height>.json` under `blocks/`
    async fn latest_height(&self) -> MonitorResult<Option<i64>> {
        let mut entries = match tokio::fs::read_dir(self.root.join("blocks")).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let height = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok());
            if let Some(h) = height {
                latest = Some(latest.map_or(h, |l: i64| l.max(h)));
            }
        }
        Ok(latest)
    }
}

#[async_trait]
impl ChainDataProvider for SpoolProvider {
    async fn get_latest_block(&self) -> MonitorResult<Option<ChainBlock>> {
        match self.latest_height().await? {
            Some(height) => self.get_block_by_height(height).await,
            None => Ok(None),
        }
    }

    async fn get_block_by_height(&self, height: i64) -> MonitorResult<Option<ChainBlock>> {
        let path = self.root.join("blocks").join(format!("{}.json", height));
        let block: Option<ChainBlock> = Self::read_json(&path).await?;
        if let Some(b) = &block {
            if b.height != height {
                return Err(MonitorError::Provider(format!(
                    "{} contains block {}",
                    path.display(),
                    b.height
                )));
            }
        }
        Ok(block)
    }

    async fn get_latest_committee(&self) -> MonitorResult<Option<(i64, Committee)>> {
        let file: Option<CommitteeFile> = Self::read_json(&self.root.join("committee.json")).await?;
        Ok(file.map(|f| (f.height, f.members)))
    }

    async fn get_transactions(&self, height: i64) -> MonitorResult<Vec<Transaction>> {
        let path = self.root.join("transactions").join(format!("{}.json", height));
        Ok(Self::read_json(&path).await?.unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "spool"
    }
}
