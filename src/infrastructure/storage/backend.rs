use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use super::error::StorageResult;

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// One page of a prefix listing.
#[derive(Debug, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// Raw S3-style primitives. `StorageService` builds the higher level
/// operations (pagination, batching, streaming uploads) on top of these.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    fn bucket(&self) -> &str;

    async fn get(&self, key: &str) -> StorageResult<ObjectReader>;

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()>;

    async fn list_page(&self, prefix: &str, token: Option<String>) -> StorageResult<ListPage>;

    /// Deletes up to 1000 keys, returning how many were actually removed.
    async fn delete_batch(&self, keys: &[String]) -> StorageResult<usize>;

    async fn create_multipart_upload(&self, key: &str, content_type: &str)
    -> StorageResult<String>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}
