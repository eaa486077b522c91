//! Mock avatar storage for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{AvatarStorage, StorageError};

const PREFIX: &str = "mock://avatars/";

/// Keeps avatars in memory under `mock://avatars/<name>` references.
#[derive(Debug, Default)]
pub struct MockAvatarStorage {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_uploads: Arc<RwLock<bool>>,
}

impl MockAvatarStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_uploads(&self, fail: bool) {
        *self.fail_uploads.write().await = fail;
    }

    pub async fn contains(&self, reference: &str) -> bool {
        self.objects.read().await.contains_key(reference)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl AvatarStorage for MockAvatarStorage {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn store(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if *self.fail_uploads.read().await {
            return Err(StorageError::Rejected {
                status: 500,
                message: "mock upload failure".to_string(),
            });
        }
        let reference = format!("{}{}", PREFIX, name);
        self.objects.write().await.insert(reference.clone(), bytes);
        Ok(reference)
    }

    async fn remove(&self, reference: &str) -> bool {
        self.objects.write().await.remove(reference).is_some()
    }

    fn owns(&self, reference: &str) -> bool {
        reference.starts_with(PREFIX)
    }
}
