use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::warn;

use super::{check_name, AvatarStorage, StorageError};
use crate::config::StorageConfig;
use crate::metrics::observe_external;

const OBJECT_DIR: &str = "profile_pics";

/// Avatars in a Supabase Storage bucket.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    /// Public URL of an object path inside the bucket.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
            .header("x-upsert", "true")
    }

    fn object_path(&self, reference: &str) -> Option<String> {
        let path = reference.strip_prefix(&self.public_url(""))?;
        let name = path.strip_prefix(OBJECT_DIR)?.strip_prefix('/')?;
        check_name(name).ok()?;
        Some(path.to_string())
    }
}

#[async_trait]
impl AvatarStorage for SupabaseStorage {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn store(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        check_name(name)?;
        let path = format!("{}/{}", OBJECT_DIR, name);
        let started = Instant::now();
        let response = self
            .authorize(self.client.put(self.object_url(&path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await;

        let result = match response {
            Ok(response) => match response.status() {
                StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(StorageError::Rejected {
                        status: status.as_u16(),
                        message: body.chars().take(200).collect(),
                    })
                }
            },
            Err(e) => Err(StorageError::Http(e)),
        };
        observe_external(
            "supabase",
            "upload",
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        result.map(|()| self.public_url(&path))
    }

    async fn remove(&self, reference: &str) -> bool {
        let Some(path) = self.object_path(reference) else {
            return false;
        };
        let started = Instant::now();
        let response = self
            .authorize(self.client.delete(self.object_url(&path)))
            .send()
            .await;
        let removed = matches!(
            &response,
            Ok(r) if matches!(r.status(), StatusCode::OK | StatusCode::NO_CONTENT)
        );
        observe_external(
            "supabase",
            "delete",
            started.elapsed().as_secs_f64(),
            removed,
        );
        if !removed {
            warn!("Failed to delete avatar object {}", path);
        }
        removed
    }

    fn owns(&self, reference: &str) -> bool {
        self.object_path(reference).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        SupabaseStorage::new(&StorageConfig {
            url: "https://proj.supabase.co/".to_string(),
            key: "service-key".to_string(),
            bucket: "profile-pics".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let s = storage();
        assert_eq!(
            s.object_url("profile_pics/a.png"),
            "https://proj.supabase.co/storage/v1/object/profile-pics/profile_pics/a.png"
        );
        assert_eq!(
            s.public_url("profile_pics/a.png"),
            "https://proj.supabase.co/storage/v1/object/public/profile-pics/profile_pics/a.png"
        );
    }

    #[test]
    fn test_owns_only_bucket_urls() {
        let s = storage();
        assert!(s.owns(
            "https://proj.supabase.co/storage/v1/object/public/profile-pics/profile_pics/user_1_2_abcd1234.png"
        ));
        assert!(!s.owns("uploads/profile_pics/user_1_2_abcd1234.png"));
        assert!(!s.owns("https://other.example/profile_pics/a.png"));
    }
}
