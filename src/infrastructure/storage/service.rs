use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};
use url::Url;

use super::backend::{ObjectBackend, ObjectReader};
use super::error::{StorageError, StorageResult};
use super::multipart::{MIN_PART_SIZE, stream_to_backend};
use super::s3::S3Backend;
use crate::config::settings::AppConfig;

/// Bulk delete limit of the S3 API.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Media object access used by the pipeline and the ops API.
///
/// Writes return a canonical `<scheme>://<bucket>/<key>` locator.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn ObjectBackend>,
    scheme: String,
    part_size: usize,
}

impl StorageService {
    pub fn new(backend: Arc<dyn ObjectBackend>, scheme: &str) -> Self {
        Self {
            backend,
            scheme: scheme.to_string(),
            part_size: MIN_PART_SIZE,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let backend = S3Backend::new(
            &config.minio_url,
            &config.minio_bucket,
            &config.minio_access_key,
            &config.minio_secret_key,
            &config.storage_region,
        );
        Self::new(Arc::new(backend), &config.locator_scheme)
    }

    #[cfg(test)]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn bucket(&self) -> &str {
        self.backend.bucket()
    }

    pub fn locator(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket(), key)
    }

    /// Accepts a bare key, a `<scheme>://<bucket>/<key>` locator or a
    /// path-style `http(s)://host/<bucket>/<key>` URL.
    pub fn resolve_key(&self, locator: &str) -> StorageResult<String> {
        if !locator.contains("://") {
            let key = locator.trim_start_matches('/');
            if key.is_empty() {
                return Err(StorageError::invalid_key(locator));
            }
            return Ok(key.to_string());
        }

        let url = Url::parse(locator)
            .map_err(|e| StorageError::invalid_key(format!("{}: {}", locator, e)))?;

        let (bucket, key) = match url.scheme() {
            "http" | "https" => {
                // `Url::path` stays percent-encoded; object keys are not
                let path = url.path().trim_start_matches('/');
                let (bucket, key) = path
                    .split_once('/')
                    .ok_or_else(|| StorageError::invalid_key(locator))?;
                let decode = |part: &str| {
                    urlencoding::decode(part)
                        .map(|s| s.into_owned())
                        .map_err(|e| StorageError::invalid_key(format!("{}: {}", locator, e)))
                };
                (decode(bucket)?, decode(key)?)
            }
            scheme => {
                let bucket = url
                    .host_str()
                    .ok_or_else(|| StorageError::invalid_key(locator))?;
                let prefix = format!("{}://{}/", scheme, bucket);
                let key = locator
                    .strip_prefix(&prefix)
                    .ok_or_else(|| StorageError::invalid_key(locator))?;
                (bucket.to_string(), key.to_string())
            }
        };

        if bucket != self.bucket() {
            return Err(StorageError::invalid_key(format!(
                "{} is outside bucket {}",
                locator,
                self.bucket()
            )));
        }
        if key.is_empty() {
            return Err(StorageError::invalid_key(locator));
        }
        Ok(key)
    }

    pub async fn get_object_buffer(&self, key: &str) -> StorageResult<Bytes> {
        let mut reader = self.backend.get(key).await?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))?;
        Ok(Bytes::from(buf))
    }

    pub async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectReader> {
        self.backend.get(key).await
    }

    /// Streams an object into a local file, returning bytes written.
    pub async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<u64> {
        let mut reader = self.get_object_stream(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))?;

        debug!("Downloaded {} ({} bytes) to {}", key, written, path.display());
        Ok(written)
    }

    pub async fn put_object_buffer(
        &self,
        key: &str,
        bytes: impl Into<Bytes>,
        content_type: &str,
    ) -> StorageResult<String> {
        self.backend.put(key, bytes.into(), content_type).await?;
        Ok(self.locator(key))
    }

    pub async fn put_object_stream<R>(
        &self,
        key: &str,
        reader: R,
        content_type: &str,
    ) -> StorageResult<String>
    where
        R: AsyncRead + Send + Unpin,
    {
        let size = stream_to_backend(
            self.backend.as_ref(),
            key,
            reader,
            content_type,
            self.part_size,
        )
        .await?;
        debug!("Uploaded {} bytes to {}", size, key);
        Ok(self.locator(key))
    }

    pub async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<String> {
        let file = tokio::fs::File::open(path).await?;
        self.put_object_stream(key, file, content_type).await
    }

    pub async fn list_keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.backend.list_page(prefix, token.take()).await?;
            keys.extend(page.keys);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }

    /// Deletes every object under `prefix`. Deleting an empty prefix is a
    /// no-op returning 0.
    pub async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let keys = self.list_keys_with_prefix(prefix).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            deleted += self.backend.delete_batch(batch).await?;
        }

        info!("🗑️ Deleted {} objects under {}", deleted, prefix);
        Ok(deleted)
    }

    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.backend.presign_get(key, expires_in).await
    }
}

/// Content type for an object written from `path`. HLS types are pinned
/// since not every platform's mime table knows them.
pub fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("m3u8") => "application/vnd.apple.mpegurl".to_string(),
        Some("ts") => "video/mp2t".to_string(),
        _ => mime_guess::from_path(path)
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
            .to_string(),
    }
}
