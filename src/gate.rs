use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};

pub const MARKER_CONTENT: &str = "Data fetched";

/// Marker file signalling that new source data arrived since the last report.
#[derive(Debug, Clone)]
pub struct FreshnessMarker {
    path: PathBuf,
}

impl FreshnessMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mark(&self) -> anyhow::Result<()> {
        std::fs::write(&self.path, MARKER_CONTENT)
            .with_context(|| format!("failed to write marker {}", self.path.display()))?;
        info!("marked new data in {}", self.path.display());
        Ok(())
    }

    pub fn is_open(&self) -> anyhow::Result<bool> {
        if !self.path.exists() {
            debug!("marker {} does not exist", self.path.display());
            return Ok(false);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read marker {}", self.path.display()))?;
        Ok(content.trim() == MARKER_CONTENT)
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove marker {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_marker() -> FreshnessMarker {
        FreshnessMarker::new(std::env::temp_dir().join(format!("marker-{}.txt", Uuid::new_v4())))
    }

    #[test]
    fn missing_marker_is_closed() {
        assert!(!temp_marker().is_open().unwrap());
    }

    #[test]
    fn mark_opens_and_clear_closes() {
        let marker = temp_marker();
        marker.mark().unwrap();
        assert!(marker.is_open().unwrap());
        marker.clear().unwrap();
        assert!(!marker.is_open().unwrap());
        assert!(!marker.path().exists());
    }

    #[test]
    fn unexpected_content_is_closed() {
        let marker = temp_marker();
        std::fs::write(marker.path(), "stale").unwrap();
        assert!(!marker.is_open().unwrap());
        marker.clear().unwrap();
    }
}
