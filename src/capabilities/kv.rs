//! Key-value stores for analysis records.

use super::KvStore;
use crate::error::CapabilityError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// One file per key under a directory.
///
/// Keys are percent-encoded into file names, so `resume:<id>` lives in
/// `resume%3A<id>.json` and distinct keys never share a file. Writes go to a temp file that is then
/// renamed over the target; readers never see a half-written record.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn set(&self, key: &str, value: &str) -> Result<(), CapabilityError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("KV set {} → {}", key, path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CapabilityError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set(&self, key: &str, value: &str) -> Result<(), CapabilityError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CapabilityError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_safe_file_names() {
        let kv = FileKv::new("/data/kv");
        assert_eq!(
            kv.path_for("resume:1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            PathBuf::from("/data/kv/resume%3A1b4e28ba-2fa1-11d2-883f-0016d3cca427.json")
        );
        assert_eq!(kv.path_for("../x"), PathBuf::from("/data/kv/..%2Fx.json"));
    }

    #[tokio::test]
    async fn similar_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path());

        kv.set("resume:a", "colon").await.unwrap();
        kv.set("resume_a", "underscore").await.unwrap();
        kv.set("resume%3Aa", "escaped").await.unwrap();

        assert_eq!(kv.get("resume:a").await.unwrap().as_deref(), Some("colon"));
        assert_eq!(kv.get("resume_a").await.unwrap().as_deref(), Some("underscore"));
        assert_eq!(kv.get("resume%3Aa").await.unwrap().as_deref(), Some("escaped"));
    }

    #[tokio::test]
    async fn file_kv_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path().join("kv"));

        assert_eq!(kv.get("resume:a").await.unwrap(), None);

        kv.set("resume:a", "{\"v\":1}").await.unwrap();
        kv.set("resume:a", "{\"v\":2}").await.unwrap();
        assert_eq!(kv.get("resume:a").await.unwrap().as_deref(), Some("{\"v\":2}"));

        let leftovers: Vec<_> = std::fs::read_dir(kv.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn memory_kv_set_then_get() {
        tokio_test::block_on(async {
            let kv = MemoryKv::new();
            assert!(kv.is_empty().await);
            kv.set("resume:b", "{}").await.unwrap();
            kv.set("resume:a", "[]").await.unwrap();
            assert_eq!(kv.get("resume:b").await.unwrap().as_deref(), Some("{}"));
            assert_eq!(kv.get("missing").await.unwrap(), None);
            assert_eq!(kv.keys().await, vec!["resume:a", "resume:b"]);
            assert_eq!(kv.len().await, 2);
        });
    }
}
