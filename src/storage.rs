use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// Public prefix under which stored objects are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stores `body` under `key` and returns the public path of the object.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<String>;
    /// Deletes the object behind a path returned by `put_object`.
    async fn delete_object(&self, public_path: &str) -> anyhow::Result<()>;
}

/// Maps `/uploads/<key>` back to `<key>`. Anything that would escape the
/// upload directory yields `None`.
pub fn key_from_public_path(public_path: &str) -> Option<&str> {
    let key = public_path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    let safe = !key.is_empty()
        && !key.contains('/')
        && !key.contains('\\')
        && key != "."
        && key != "..";
    safe.then_some(key)
}

/// Files on local disk, served statically at [`PUBLIC_PREFIX`].
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Creates the directory if it does not exist yet.
    pub async fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<String> {
        let public_path = format!("{PUBLIC_PREFIX}/{key}");
        anyhow::ensure!(
            key_from_public_path(&public_path) == Some(key),
            "invalid object key {key:?}"
        );
        let path = self.root.join(key);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(%key, %content_type, bytes = body.len(), "object stored");
        Ok(public_path)
    }

    async fn delete_object(&self, public_path: &str) -> anyhow::Result<()> {
        let key = key_from_public_path(public_path)
            .with_context(|| format!("not an upload path: {public_path}"))?;
        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

#[cfg(test)]
pub mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Keeps objects in memory, keyed by public path.
    #[derive(Default)]
    pub struct FakeStorage {
        pub objects: Mutex<HashMap<String, Bytes>>,
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(&self, key: &str, body: Bytes, _ct: &str) -> anyhow::Result<String> {
            let path = format!("{PUBLIC_PREFIX}/{key}");
            self.objects.lock().unwrap().insert(path.clone(), body);
            Ok(path)
        }

        async fn delete_object(&self, public_path: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().remove(public_path);
            Ok(())
        }
    }
}
