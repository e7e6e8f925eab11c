//! In-memory store of revocable binary resources.
//!
//! A [`ResourceHandle`] is an address into the store, the native counterpart
//! of a browser object URL. Handles stay fetchable until revoked.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

/// File name offered when saving a generated resource.
pub const DOWNLOAD_FILE_NAME: &str = "generated-music.midi";

/// Opaque reference to bytes held by a [`ResourceStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    id: Uuid,
}

impl ResourceHandle {
    /// Address in `blob:amg/<uuid>` form.
    pub fn url(&self) -> String {
        format!("blob:amg/{}", self.id)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: HashMap<Uuid, Arc<[u8]>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, bytes: Vec<u8>) -> ResourceHandle {
        let id = Uuid::new_v4();
        log::debug!("Created resource blob:amg/{} ({} bytes)", id, bytes.len());
        self.entries.insert(id, Arc::from(bytes));
        ResourceHandle { id }
    }

    pub fn fetch(&self, handle: &ResourceHandle) -> Result<Arc<[u8]>> {
        self.entries
            .get(&handle.id)
            .cloned()
            .with_context(|| format!("Resource {} has been revoked", handle))
    }

    /// Release the bytes behind `handle`. Returns false if already revoked.
    pub fn revoke(&mut self, handle: &ResourceHandle) -> bool {
        let removed = self.entries.remove(&handle.id).is_some();
        if removed {
            log::debug!("Revoked {}", handle);
        }
        removed
    }

    pub fn revoke_all(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("Revoking {} resource(s)", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Write the resource into `dir` as [`DOWNLOAD_FILE_NAME`].
    pub fn save_to_dir(&self, handle: &ResourceHandle, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(DOWNLOAD_FILE_NAME);
        self.save_as(handle, &target)?;
        Ok(target)
    }

    /// Atomically write the resource to `target` via temp file + persist.
    pub fn save_as(&self, handle: &ResourceHandle, target: &Path) -> Result<()> {
        let bytes = self.fetch(handle)?;
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .context("Failed to create temp file")?;
        tmp.write_all(&bytes).context("Failed to write resource")?;
        tmp.persist(target)
            .with_context(|| format!("Failed to save {}", target.display()))?;
        log::info!("Saved {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_fetch() {
        let mut store = ResourceStore::new();
        let handle = store.create(vec![1, 2, 3]);
        assert_eq!(&*store.fetch(&handle).unwrap(), &[1, 2, 3]);
        assert!(handle.url().starts_with("blob:amg/"));
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_revoked_handle_cannot_be_fetched() {
        let mut store = ResourceStore::new();
        let handle = store.create(vec![9]);
        assert!(store.revoke(&handle));
        assert!(store.fetch(&handle).is_err());
        assert!(!store.revoke(&handle));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_handles_are_distinct() {
        let mut store = ResourceStore::new();
        let a = store.create(vec![1]);
        let b = store.create(vec![1]);
        assert_ne!(a, b);
        store.revoke_all();
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_save_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResourceStore::new();
        let handle = store.create(b"MThd".to_vec());

        let path = store.save_to_dir(&handle, &dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), DOWNLOAD_FILE_NAME);
        assert_eq!(std::fs::read(&path).unwrap(), b"MThd");
    }

    #[test]
    fn test_save_revoked_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResourceStore::new();
        let handle = store.create(vec![0]);
        store.revoke(&handle);
        assert!(store.save_to_dir(&handle, dir.path()).is_err());
    }
}
