use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::StoreError, ports::Store, stream::ByteStream};

/// File-backed object store.
///
/// Results land in `result_root/<key>`, written through a uniquely named
/// `<key>.tmp-<uuid>` sibling that is renamed into place once the source
/// stream is drained. Concurrent writes of one key never share a temp file;
/// the last rename wins.
/// Source lookups resolve relative keys against `input_root`, or the working
/// directory when none is configured.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    result_root: PathBuf,
    input_root: Option<PathBuf>,
}

impl FsObjectStore {
    pub fn new(result_root: impl Into<PathBuf>) -> Self {
        Self {
            result_root: result_root.into(),
            input_root: None,
        }
    }

    pub fn with_input_root(mut self, input_root: impl Into<PathBuf>) -> Self {
        self.input_root = Some(input_root.into());
        self
    }

    pub fn result_root(&self) -> &Path {
        &self.result_root
    }

    pub fn input_root(&self) -> Option<&Path> {
        self.input_root.as_deref()
    }

    /// Keys are flat file names. Anything that could escape the root is
    /// rejected.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0'])
    }

    pub fn path_for_key(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !Self::is_valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.result_root.join(key))
    }

    pub fn source_path(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        match &self.input_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.result_root)
            .await
            .map_err(|source| StoreError::Io {
                key: self.result_root.display().to_string(),
                source,
            })
    }

    async fn drain_into(
        &self,
        key: &str,
        tmp: &Path,
        mut src: ByteStream,
    ) -> Result<u64, StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(tmp).await.map_err(io_err)?;
        let written = tokio::io::copy(&mut src, &mut file)
            .await
            .map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(written)
    }
}

#[async_trait]
impl Store for FsObjectStore {
    async fn write_object(&self, key: &str, src: ByteStream) -> Result<(), StoreError> {
        let path = self.path_for_key(key)?;
        self.ensure_root().await?;

        let tmp = self
            .result_root
            .join(format!("{key}.tmp-{}", Uuid::new_v4().simple()));
        let written = match self.drain_into(key, &tmp, src).await {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                    debug!(path = %tmp.display(), error = %cleanup, "no partial object to remove");
                }
                return Err(err);
            }
        };

        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            warn!(key, error = %source, "failed to move object into place");
            return Err(StoreError::Io {
                key: key.to_string(),
                source,
            });
        }

        debug!(key, bytes = written, path = %path.display(), "object written");
        Ok(())
    }

    async fn has_object(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        tokio::fs::metadata(self.source_path(key))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    fn resolve_source(&self, key: &str) -> String {
        self.source_path(key).to_string_lossy().into_owned()
    }
}

/// In-memory object store. Every object is kept until the store is dropped.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.lock().insert(key.into(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn write_object(&self, key: &str, mut src: ByteStream) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut bytes = Vec::new();
        src.read_to_end(&mut bytes)
            .await
            .map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })?;

        self.insert(key, bytes);
        Ok(())
    }

    async fn has_object(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}
