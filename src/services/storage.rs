use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Blob storage boundary. The engine only ever addresses documents by an
/// opaque key; whatever sits behind this trait owns the bytes.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Local-disk storage rooted at a single directory.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        // Keys are server-generated, but never let one climb out of the root
        if key.contains("..") || key.starts_with('/') {
            anyhow::bail!("Invalid storage key: {key}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn save(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        Ok(fs::read(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_read_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path().to_path_buf());

        storage
            .save("owner/doc-1", b"hello".to_vec())
            .await
            .unwrap();
        assert!(storage.exists("owner/doc-1").await.unwrap());
        assert_eq!(storage.read("owner/doc-1").await.unwrap(), b"hello");

        storage.delete("owner/doc-1").await.unwrap();
        assert!(!storage.exists("owner/doc-1").await.unwrap());
        // deleting again is a no-op
        storage.delete("owner/doc-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path().to_path_buf());
        assert!(storage.read("../etc/passwd").await.is_err());
        assert!(storage.save("/abs", vec![]).await.is_err());
    }
}
