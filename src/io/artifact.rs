//! Durable storage for the remediation plan.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Owner of the current plan text and its dirty/clean flag.
///
/// `modified` is true when the plan was generated or enhanced this cycle and
/// false when it was loaded unchanged from disk or carried across environment
/// advancement. Downstream, a clean plan skips the syntax and structure gates
/// (they are assumed still valid from a prior pass).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
    content: String,
    modified: bool,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: String::new(),
            modified: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub fn mark_unmodified(&mut self) {
        self.modified = false;
    }

    /// Load prior persisted content if present. Absence does not fail the
    /// workflow; it simply forces generation. Returns whether content was
    /// loaded.
    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no existing plan");
            return Ok(false);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("read plan {}", self.path.display()))?;
        info!(path = %self.path.display(), bytes = content.len(), "loaded existing plan");
        self.content = content;
        self.modified = false;
        Ok(true)
    }

    /// Replace the plan wholesale with freshly generated content.
    pub fn replace(&mut self, content: String) {
        self.content = content;
        self.modified = true;
    }

    /// Persist the plan. Idempotent: when the on-disk bytes already equal the
    /// current content the write is skipped and `modified` is left as-is.
    /// Returns whether a write happened.
    pub fn save(&self) -> Result<bool> {
        if self.content.is_empty() {
            return Ok(false);
        }
        if self.path.exists() {
            if let Ok(existing) = fs::read_to_string(&self.path) {
                if existing == self.content {
                    debug!(path = %self.path.display(), "plan unchanged on disk, skipping write");
                    return Ok(false);
                }
            }
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create plan dir {}", parent.display()))?;
            }
        }
        fs::write(&self.path, &self.content)
            .with_context(|| format!("write plan {}", self.path.display()))?;
        info!(path = %self.path.display(), bytes = self.content.len(), "plan saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_false_and_keeps_modified() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = ArtifactStore::new(temp.path().join("plan.txt"));
        assert!(!store.load_existing().expect("load"));
        assert!(store.is_modified());
        assert!(store.is_empty());
    }

    #[test]
    fn load_existing_clears_modified() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.txt");
        fs::write(&path, "prior plan").expect("seed");
        let mut store = ArtifactStore::new(&path);
        assert!(store.load_existing().expect("load"));
        assert!(!store.is_modified());
        assert_eq!(store.content(), "prior plan");
    }

    #[test]
    fn save_is_idempotent_for_identical_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.txt");
        let mut store = ArtifactStore::new(&path);
        store.replace("the plan".to_string());

        assert!(store.save().expect("first save"));
        store.mark_unmodified();
        assert!(!store.save().expect("second save"));
        assert!(!store.is_modified());
        assert_eq!(fs::read_to_string(&path).expect("read"), "the plan");
    }

    #[test]
    fn save_rewrites_when_content_differs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.txt");
        fs::write(&path, "old").expect("seed");
        let mut store = ArtifactStore::new(&path);
        store.replace("new".to_string());
        assert!(store.save().expect("save"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "new");
    }

    #[test]
    fn replace_marks_modified() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("plan.txt");
        fs::write(&path, "prior").expect("seed");
        let mut store = ArtifactStore::new(&path);
        store.load_existing().expect("load");
        store.replace("regenerated".to_string());
        assert!(store.is_modified());
    }
}
