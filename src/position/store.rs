//! Durable storage for the position book and paper ledger

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::common::errors::{BotError, Result};

/// Whole-document storage; every save replaces the previous document
pub trait Store<T>: Send + Sync {
    /// The last saved document, or `None` if nothing was saved yet
    fn load(&self) -> Result<Option<T>>;

    /// Replace the stored document; fails with `BotError::Persistence`
    fn save(&self, document: &T) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on save
///
/// The document is written to `<file>.tmp` and renamed over the target, so a
/// reader sees either the old or the new document, never a partial one.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> Store<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| {
            BotError::Persistence(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let document = serde_json::from_str(&raw).map_err(|e| {
            BotError::Persistence(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(Some(document))
    }

    fn save(&self, document: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| BotError::Persistence(format!("failed to encode document: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                BotError::Persistence(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = self.temp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            // Contents must reach the disk before the rename publishes them
            file.sync_all()
        };
        write_tmp().map_err(|e| {
            BotError::Persistence(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            BotError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "Saved document");
        Ok(())
    }
}

/// In-memory store; clones share the same document
///
/// Saves can be made to fail on demand to exercise the fatal persistence path.
#[derive(Debug)]
pub struct MemoryStore<T> {
    document: Arc<Mutex<Option<T>>>,
    saves: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            document: Arc::clone(&self.document),
            saves: Arc::clone(&self.saves),
            failing: Arc::clone(&self.failing),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            document: Arc::new(Mutex::new(None)),
            saves: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `document`
    pub fn with_document(document: T) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.document.lock() {
            *slot = Some(document);
        }
        store
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The last saved document
    pub fn snapshot(&self) -> Option<T> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

impl<T> Store<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Option<T>> {
        self.document
            .lock()
            .map(|d| d.clone())
            .map_err(|e| BotError::Persistence(format!("store lock poisoned: {}", e)))
    }

    fn save(&self, document: &T) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::Persistence("simulated write failure".to_string()));
        }
        let mut slot = self
            .document
            .lock()
            .map_err(|e| BotError::Persistence(format!("store lock poisoned: {}", e)))?;
        *slot = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
