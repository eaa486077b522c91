use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{check_name, AvatarStorage, StorageError};

/// Prefix of references produced by [`LocalAvatarStorage`].
pub const LOCAL_PREFIX: &str = "uploads/profile_pics/";

/// Avatars on the local filesystem, served from `/uploads`.
pub struct LocalAvatarStorage {
    dir: PathBuf,
}

impl LocalAvatarStorage {
    /// `uploads_dir` is the served uploads root; files go in `profile_pics/`.
    pub fn new(uploads_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: uploads_dir.as_ref().join("profile_pics"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.replace('\\', "/");
        let name = name.strip_prefix(LOCAL_PREFIX)?;
        check_name(name).ok()?;
        Some(self.dir.join(name))
    }
}

#[async_trait]
impl AvatarStorage for LocalAvatarStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        check_name(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored avatar at {}", path.display());
        Ok(format!("{}{}", LOCAL_PREFIX, name))
    }

    async fn remove(&self, reference: &str) -> bool {
        let Some(path) = self.resolve(reference) else {
            return false;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove avatar {}: {}", path.display(), e);
                false
            }
        }
    }

    fn owns(&self, reference: &str) -> bool {
        self.resolve(reference).is_some()
    }
}
