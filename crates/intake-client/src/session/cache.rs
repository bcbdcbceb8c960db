//! Durable storage for the session id between runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// The single well-known key the id is stored under.
pub const SESSION_CACHE_KEY: &str = "intake.sessionId";

/// What was cached, exactly as read. `id` is not parsed here so a tampered value
/// can be told apart from a missing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    pub id: String,
    /// False for an id generated locally that the server has not accepted yet.
    #[serde(default = "default_confirmed")]
    pub confirmed: bool,
}

fn default_confirmed() -> bool {
    true
}

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn load(&self) -> Result<Option<CachedSession>>;
    async fn store(&self, session: &CachedSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// JSON object on disk; the session lives under [`SESSION_CACHE_KEY`] and other
/// keys are preserved.
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document. A missing or unreadable file is an empty one.
    async fn read_document(&self) -> Result<Map<String, Value>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(path = %self.path.display(), "Session cache is corrupt, ignoring it");
                Ok(Map::new())
            }
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(document).context("Serialize session cache")?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionCache for FileSessionCache {
    async fn load(&self) -> Result<Option<CachedSession>> {
        let document = self.read_document().await?;
        let cached = match document.get(SESSION_CACHE_KEY) {
            None | Some(Value::Null) => None,
            // Bare string: an id the server issued.
            Some(Value::String(id)) => Some(CachedSession {
                id: id.clone(),
                confirmed: true,
            }),
            Some(value) => match serde_json::from_value::<CachedSession>(value.clone()) {
                Ok(cached) => Some(cached),
                Err(_) => Some(CachedSession {
                    id: value.to_string(),
                    confirmed: false,
                }),
            },
        };
        Ok(cached)
    }

    async fn store(&self, session: &CachedSession) -> Result<()> {
        let mut document = self.read_document().await?;
        document.insert(
            SESSION_CACHE_KEY.to_string(),
            serde_json::to_value(session).context("Serialize cached session")?,
        );
        self.write_document(&document).await
    }

    async fn clear(&self) -> Result<()> {
        let mut document = self.read_document().await?;
        if document.remove(SESSION_CACHE_KEY).is_some() {
            self.write_document(&document).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionCache {
    value: Mutex<Option<CachedSession>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(session: CachedSession) -> Self {
        Self {
            value: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn load(&self) -> Result<Option<CachedSession>> {
        Ok(self.value.lock().await.clone())
    }

    async fn store(&self, session: &CachedSession) -> Result<()> {
        *self.value.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.value.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(id: &str) -> CachedSession {
        CachedSession {
            id: id.to_string(),
            confirmed: true,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileSessionCache::new(dir.path().join("nested/session.json"));
        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, br#"{"intake.theme":"dark"}"#)
            .await
            .unwrap();

        let cache = FileSessionCache::new(&path);
        let session = cached("3f2504e0-4f89-41d3-9a0c-0305e82c3301");
        cache.store(&session).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(session));

        let raw: Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw["intake.theme"], "dark");
        assert!(raw.get(SESSION_CACHE_KEY).is_some());

        cache.clear().await.unwrap();
        assert_eq!(cache.load().await.unwrap(), None);
        let raw: Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw["intake.theme"], "dark");
    }

    #[tokio::test]
    async fn tampered_values_are_returned_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, br#"{"intake.sessionId":"not-a-uuid"}"#)
            .await
            .unwrap();

        let cache = FileSessionCache::new(&path);
        assert_eq!(cache.load().await.unwrap(), Some(cached("not-a-uuid")));

        tokio::fs::write(&path, b"{ this is not json").await.unwrap();
        assert_eq!(cache.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemorySessionCache::new();
        assert_eq!(cache.load().await.unwrap(), None);
        cache.store(&cached("abc")).await.unwrap();
        assert_eq!(cache.load().await.unwrap(), Some(cached("abc")));
        cache.clear().await.unwrap();
        assert_eq!(cache.load().await.unwrap(), None);
    }
}
