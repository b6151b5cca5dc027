//! In-process object backend used by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use super::backend::{ListPage, ObjectBackend, ObjectReader, UploadedPart};
use super::error::{StorageError, StorageResult};

pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

pub struct InMemoryBackend {
    bucket: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    uploads: Mutex<HashMap<String, (String, BTreeMap<i32, Bytes>)>>,
    pub list_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub part_uploads: AtomicUsize,
    pub aborted: AtomicUsize,
    /// Keys in the order their writes completed
    pub writes: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            page_size: 1000,
            objects: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            part_uploads: AtomicUsize::new(0),
            aborted: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn body(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|o| o.body.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(&self, key: &str) -> StorageResult<ObjectReader> {
        let body = self.body(key).ok_or_else(|| StorageError::not_found(key))?;
        Ok(Box::pin(std::io::Cursor::new(body)))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        self.writes.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> StorageResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap();

        // Token is the last key of the previous page
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| token.as_ref().is_none_or(|t| k.as_str() > t.as_str()))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        let next_token = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<usize> {
        if keys.len() > 1000 {
            return Err(StorageError::delete_failed("more than 1000 keys in one request"));
        }
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut objects = self.objects.lock().unwrap();
        Ok(keys.iter().filter(|k| objects.remove(*k).is_some()).count())
    }

    async fn create_multipart_upload(
        &self,
        _key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        self.uploads
            .lock()
            .unwrap()
            .insert(upload_id.clone(), (content_type.to_string(), BTreeMap::new()));
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<UploadedPart> {
        self.part_uploads.fetch_add(1, Ordering::SeqCst);
        let mut uploads = self.uploads.lock().unwrap();
        let (_, parts) = uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::upload_failed("unknown upload"))?;
        parts.insert(part_number, body);

        Ok(UploadedPart {
            part_number,
            e_tag: format!("etag-{}", part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<()> {
        let (content_type, stored) = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| StorageError::upload_failed("unknown upload"))?;

        let mut body = BytesMut::new();
        for part in parts {
            let chunk = stored
                .get(&part.part_number)
                .ok_or_else(|| StorageError::upload_failed("missing part"))?;
            body.extend_from_slice(chunk);
        }
        self.writes.lock().unwrap().push(key.to_string());

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.freeze(),
                content_type,
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(&self, _key: &str, upload_id: &str) -> StorageResult<()> {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().remove(upload_id);
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "http://localhost:9000/{}/{}?X-Amz-Expires={}",
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }
}
