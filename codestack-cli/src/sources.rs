use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use codestack_core::{SourceAccessor, SourceId};

/// Reads sources straight from the filesystem. `file://` URIs are accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceAccessor;

pub fn source_path(source: &SourceId) -> PathBuf {
    let raw = source.as_str();
    PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
}

#[async_trait]
impl SourceAccessor for FsSourceAccessor {
    async fn read(&self, source: &SourceId) -> Result<String> {
        let path = source_path(source);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read source {:?}", path))
    }
}
