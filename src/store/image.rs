use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::Result;

/// Write-once sink for uploaded laptop images.
///
/// Stores do not inspect the payload; size limits are enforced by callers.
#[tonic::async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists `data` for `laptop_id` and returns the generated image id.
    async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> Result<String>;
}

/// Metadata of an image written by [`DiskImageStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    /// Owning laptop.
    pub laptop_id: String,
    /// File extension including the leading dot.
    pub image_type: String,
    /// Location of the payload on disk.
    pub path: PathBuf,
}

/// Image store writing each payload to `<folder>/<id><image_type>`.
#[derive(Clone)]
pub struct DiskImageStore {
    folder: PathBuf,
    images: Arc<RwLock<HashMap<String, ImageInfo>>>,
}

impl DiskImageStore {
    /// Creates a store writing into `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            images: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Folder payloads are written to.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Metadata of a stored image.
    pub async fn get(&self, image_id: &str) -> Option<ImageInfo> {
        self.images.read().await.get(image_id).cloned()
    }
}

#[tonic::async_trait]
impl ImageStore for DiskImageStore {
    async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> Result<String> {
        let image_id = Uuid::new_v4().to_string();
        let path = self.folder.join(format!("{image_id}{image_type}"));

        tokio::fs::create_dir_all(&self.folder).await?;
        tokio::fs::write(&path, &data).await?;
        debug!(image_id = %image_id, path = %path.display(), "wrote image file");

        self.images.write().await.insert(
            image_id.clone(),
            ImageInfo {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
                path,
            },
        );

        Ok(image_id)
    }
}

/// A stored image held entirely in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    /// Owning laptop.
    pub laptop_id: String,
    /// File extension including the leading dot.
    pub image_type: String,
    /// Raw payload.
    pub data: Vec<u8>,
}

/// Image store keeping payloads in memory.
#[derive(Clone, Default)]
pub struct InMemoryImageStore {
    images: Arc<RwLock<HashMap<String, Image>>>,
}

impl InMemoryImageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored image.
    pub async fn get(&self, image_id: &str) -> Option<Image> {
        self.images.read().await.get(image_id).cloned()
    }

    /// Number of stored images.
    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    /// Whether no image was stored.
    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }
}

#[tonic::async_trait]
impl ImageStore for InMemoryImageStore {
    async fn save(&self, laptop_id: &str, image_type: &str, data: Vec<u8>) -> Result<String> {
        let image_id = Uuid::new_v4().to_string();

        self.images.write().await.insert(
            image_id.clone(),
            Image {
                laptop_id: laptop_id.to_string(),
                image_type: image_type.to_string(),
                data,
            },
        );

        Ok(image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_store_writes_payload_under_generated_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskImageStore::new(dir.path().join("img"));

        let id = store.save("laptop-1", ".png", vec![1, 2, 3]).await.unwrap();
        let info = store.get(&id).await.unwrap();

        assert_eq!(info.laptop_id, "laptop-1");
        assert_eq!(info.image_type, ".png");
        assert_eq!(info.path, store.folder().join(format!("{id}.png")));
        assert_eq!(tokio::fs::read(&info.path).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn each_save_gets_a_fresh_id() {
        let store = InMemoryImageStore::new();
        let a = store.save("laptop", ".jpg", vec![0]).await.unwrap();
        let b = store.save("laptop", ".jpg", vec![0]).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(&a).await.unwrap().data, vec![0]);
    }
}
