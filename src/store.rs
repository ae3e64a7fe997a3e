//! Session storage.
//!
//! Games never touch a global store. They receive a `SessionStore` and
//! write whole `SessionRecord`s as JSON under their own key.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::session::{QuestionResult, SessionRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError
{
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage IO error on {path}: {source}")]
    Io
    {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode session record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait SessionStore
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for &mut S
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>
    {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>
    {
        (**self).set(key, value)
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError>
    {
        (**self).clear(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError>
    {
        (**self).keys()
    }
}

#[derive(Default, Debug, Clone)]
pub struct MemoryStore
{
    entries: HashMap<String, String>,
}

impl MemoryStore
{
    pub fn new() -> Self
    {
        Self::default()
    }
}

impl SessionStore for MemoryStore
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>
    {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>
    {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError>
    {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError>
    {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore
{
    dir: PathBuf,
}

impl FileStore
{
    pub fn new(dir: impl Into<PathBuf>) -> Self
    {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path
    {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf
    {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl SessionStore for FileStore
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>
    {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>
    {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StoreError::Io { path, source })
    }

    fn clear(&mut self, key: &str) -> Result<(), StoreError>
    {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError>
    {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn sanitize_key(key: &str) -> String
{
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Reads a stored record. Missing or unparsable data is treated as absent.
pub fn load_record<S: SessionStore + ?Sized>(store: &S, key: &str) -> Option<SessionRecord>
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!("Failed to read {key}: {err}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("Ignoring unparsable record under {key}: {err}");
            None
        }
    }
}

/// Owns one game's live `SessionRecord` and mirrors it into the store.
pub struct Recorder<S>
{
    store: S,
    key: String,
    record: SessionRecord,
}

impl<S: SessionStore> Recorder<S>
{
    pub fn new(store: S, key: impl Into<String>, game_name: impl Into<String>) -> Self
    {
        Self {
            store,
            key: key.into(),
            record: SessionRecord::new(game_name),
        }
    }

    pub fn key(&self) -> &str
    {
        &self.key
    }

    pub fn record(&self) -> &SessionRecord
    {
        &self.record
    }

    pub fn store(&self) -> &S
    {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S
    {
        &mut self.store
    }

    /// Fresh mount: drops whatever the key held and writes an empty record.
    pub fn begin(&mut self) -> Result<(), StoreError>
    {
        self.record = SessionRecord::new(self.record.game_name.clone());
        self.store.clear(&self.key)?;
        self.persist()
    }

    /// Upserts into the live record first, so a storage failure never loses
    /// the in-memory result.
    pub fn save(&mut self, result: QuestionResult) -> Result<(), StoreError>
    {
        debug!(
            key = %self.key,
            question_id = result.question_id,
            score = result.score,
            "Recording question result"
        );
        self.record.upsert(result);
        self.persist()
    }

    fn persist(&mut self) -> Result<(), StoreError>
    {
        let encoded = serde_json::to_string(&self.record)?;
        self.store.set(&self.key, &encoded)
    }
}
