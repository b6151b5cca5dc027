use std::time::Duration;

use super::dto::{
    DEFAULT_PRESIGN_SECS, DeletePrefixResponse, MAX_PRESIGN_SECS, ObjectListResponse,
    PresignResponse,
};
use crate::infrastructure::storage::{StorageError, StorageResult, StorageService};

pub struct StorageOpsService;

impl StorageOpsService {
    pub async fn list(storage: &StorageService, prefix: Option<String>) -> StorageResult<ObjectListResponse> {
        let prefix = prefix.unwrap_or_default();
        let keys = storage.list_keys_with_prefix(&prefix).await?;
        Ok(ObjectListResponse {
            prefix,
            count: keys.len(),
            keys,
        })
    }

    /// Refuses an empty prefix, which would wipe the bucket.
    pub async fn delete_prefix(storage: &StorageService, prefix: &str) -> StorageResult<DeletePrefixResponse> {
        if prefix.trim_matches('/').is_empty() {
            return Err(StorageError::invalid_key("refusing to delete with an empty prefix"));
        }
        let deleted = storage.delete_prefix(prefix).await?;
        Ok(DeletePrefixResponse {
            prefix: prefix.to_string(),
            deleted,
        })
    }

    pub async fn presign(
        storage: &StorageService,
        locator: &str,
        expires_in: Option<u64>,
    ) -> StorageResult<PresignResponse> {
        let key = storage.resolve_key(locator)?;
        let expires_in = expires_in
            .unwrap_or(DEFAULT_PRESIGN_SECS)
            .clamp(1, MAX_PRESIGN_SECS);

        let url = storage
            .presign_get(&key, Duration::from_secs(expires_in))
            .await?;
        Ok(PresignResponse { key, url, expires_in })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::infrastructure::storage::memory::InMemoryBackend;

    fn storage() -> (Arc<InMemoryBackend>, StorageService) {
        let backend = Arc::new(InMemoryBackend::new("videos"));
        let storage = StorageService::new(backend.clone(), "s3");
        (backend, storage)
    }

    #[tokio::test]
    async fn test_list_defaults_to_whole_bucket() {
        let (backend, storage) = storage();
        backend.insert("a/1", "x");
        backend.insert("b/2", "x");

        let all = StorageOpsService::list(&storage, None).await.unwrap();
        assert_eq!(all.count, 2);

        let some = StorageOpsService::list(&storage, Some("b/".to_string())).await.unwrap();
        assert_eq!(some.keys, vec!["b/2"]);
    }

    #[tokio::test]
    async fn test_delete_prefix_refuses_empty_prefix() {
        let (backend, storage) = storage();
        backend.insert("a/1", "x");

        let err = StorageOpsService::delete_prefix(&storage, "/").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert_eq!(backend.keys().len(), 1);

        let res = StorageOpsService::delete_prefix(&storage, "a/").await.unwrap();
        assert_eq!(res.deleted, 1);
        assert!(backend.keys().is_empty());
    }

    #[tokio::test]
    async fn test_presign_clamps_expiry() {
        let (_, storage) = storage();

        let res = StorageOpsService::presign(&storage, "s3://videos/hls/a/master.m3u8", Some(10_000_000))
            .await
            .unwrap();
        assert_eq!(res.key, "hls/a/master.m3u8");
        assert_eq!(res.expires_in, MAX_PRESIGN_SECS);
        assert!(res.url.contains("X-Amz-Expires=604800"));

        let res = StorageOpsService::presign(&storage, "hls/a/master.m3u8", None).await.unwrap();
        assert_eq!(res.expires_in, DEFAULT_PRESIGN_SECS);

        assert!(StorageOpsService::presign(&storage, "s3://other/x", None).await.is_err());
    }
}
