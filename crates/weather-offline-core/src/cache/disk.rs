//! On-disk cache storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! containers.json                     container names, creation order
//! <hex(name)>/<sha256>.json           entry metadata plus its body file name
//! <hex(name)>/<sha256>.<unique>.body  raw body bytes, absent for a null body
//! ```
//!
//! Every put writes a fresh body file before renaming the metadata into
//! place, so the metadata rename is the commit point and readers only ever
//! see one write's status, headers and body together.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CacheKey, CacheStorage, CachedResponse};
use crate::error::CacheError;
use crate::http::{Request, Response};

const MANIFEST_FILE: &str = "containers.json";

/// Unique per process and per write; the process id keeps separate CLI
/// runs sharing a cache root apart.
fn unique_suffix() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{}-{}", std::process::id(), COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Contents of an entry's metadata file.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    entry: CachedResponse,
    #[serde(default)]
    body_file: Option<String>,
}

pub struct DiskCacheStorage {
    root: PathBuf,
    /// Serializes read-modify-write of the manifest.
    manifest_lock: Mutex<()>,
    /// One lock per metadata path, held for a whole put.
    entry_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DiskCacheStorage {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            manifest_lock: Mutex::new(()),
            entry_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, name: &str) -> PathBuf {
        self.root.join(hex::encode(name))
    }

    fn meta_path(&self, name: &str, key: &CacheKey) -> PathBuf {
        self.container_dir(name).join(format!("{}.json", key.digest()))
    }

    async fn entry_lock(&self, meta_path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.entry_locks.lock().await;
        Arc::clone(locks.entry(meta_path.to_path_buf()).or_default())
    }

    async fn read_manifest(&self) -> Result<Vec<String>, CacheError> {
        match fs::read_to_string(self.root.join(MANIFEST_FILE)).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_manifest(&self, names: &[String]) -> Result<(), CacheError> {
        let contents = serde_json::to_vec_pretty(names)?;
        self.write_atomic(&self.root.join(MANIFEST_FILE), &contents).await
    }

    /// Write through a uniquely named temp file so readers never see a torn file.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), CacheError> {
        let tmp = path.with_extension(format!("{}.tmp", unique_suffix()));
        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_body(path: &Path) -> Result<Option<Bytes>, CacheError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_stored(meta_path: &Path) -> Result<Option<StoredEntry>, CacheError> {
        match fs::read_to_string(meta_path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_if_present(path: &Path) -> Result<(), CacheError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_entry(&self, name: &str, meta_path: &Path) -> Result<Option<CachedResponse>, CacheError> {
        let Some(StoredEntry { mut entry, body_file }) = Self::read_stored(meta_path).await? else {
            return Ok(None);
        };
        if entry.has_body {
            let body = match body_file {
                Some(file) => Self::read_body(&self.container_dir(name).join(file)).await?,
                None => None,
            };
            match body {
                Some(body) => entry.body = Some(body),
                // Superseded between reading the metadata and the body
                None => {
                    debug!(cache = name, url = %entry.key.url, "Entry body missing, treating as miss");
                    return Ok(None);
                }
            }
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let _guard = self.manifest_lock.lock().await;
        fs::create_dir_all(self.container_dir(name)).await?;
        let mut names = self.read_manifest().await?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            self.write_manifest(&names).await?;
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.read_manifest().await?.iter().any(|n| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.read_manifest().await
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let _guard = self.manifest_lock.lock().await;
        let mut names = self.read_manifest().await?;
        if !names.iter().any(|n| n == name) {
            return Ok(false);
        }
        match fs::remove_dir_all(self.container_dir(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        names.retain(|n| n != name);
        self.write_manifest(&names).await?;
        Ok(true)
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), CacheError> {
        let entry = CachedResponse::new(request, response)?;
        if !self.has(name).await? {
            return Err(CacheError::NotFound(name.to_string()));
        }

        let dir = self.container_dir(name);
        let meta_path = self.meta_path(name, &entry.key);
        let lock = self.entry_lock(&meta_path).await;
        let _guard = lock.lock().await;

        let previous = match Self::read_stored(&meta_path).await {
            Ok(stored) => stored.and_then(|stored| stored.body_file),
            Err(e) => {
                debug!(cache = name, url = %entry.key.url, error = %e, "Replacing unreadable entry");
                None
            }
        };

        // Not reachable by readers until the metadata below names it
        let body_file = match &entry.body {
            Some(body) => {
                let file = format!("{}.{}.body", entry.key.digest(), unique_suffix());
                let path = dir.join(&file);
                if let Err(e) = fs::write(&path, body).await {
                    let _ = fs::remove_file(&path).await;
                    return Err(e.into());
                }
                Some(file)
            }
            None => None,
        };

        let stored = StoredEntry { entry, body_file };
        let meta = serde_json::to_vec_pretty(&stored)?;
        if let Err(e) = self.write_atomic(&meta_path, &meta).await {
            if let Some(ref file) = stored.body_file {
                let _ = fs::remove_file(dir.join(file)).await;
            }
            return Err(e);
        }

        if let Some(old) = previous.filter(|old| Some(old) != stored.body_file.as_ref()) {
            if let Err(e) = Self::remove_if_present(&dir.join(&old)).await {
                warn!(cache = name, file = %old, error = %e, "Failed to remove superseded body");
            }
        }
        Ok(())
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, CacheError> {
        if !self.has(name).await? {
            return Ok(None);
        }
        let key = CacheKey::from_request(request);
        let entry = self.load_entry(name, &self.meta_path(name, &key)).await?;
        Ok(entry
            .filter(|entry| entry.matches(request))
            .map(|entry| entry.to_response()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CachedResponse>, CacheError> {
        if !self.has(name).await? {
            return Err(CacheError::NotFound(name.to_string()));
        }

        let mut list = Vec::new();
        let mut dir = fs::read_dir(self.container_dir(name)).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.load_entry(name, &path).await {
                Ok(Some(entry)) => list.push(entry),
                Ok(None) => {}
                Err(e) => warn!(cache = name, path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        list.sort_by_key(|e| e.cached_at);
        Ok(list)
    }
}
