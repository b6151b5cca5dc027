use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use super::backend::{ObjectBackend, UploadedPart};
use super::error::{StorageError, StorageResult};

// Minimum part size for S3 is 5MB. We use 6MB to be safe.
pub const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

pub struct MultipartUploader<'a> {
    backend: &'a dyn ObjectBackend,
    key: String,
    upload_id: String,
    parts: Vec<UploadedPart>,
    part_number: i32,
    part_size: usize,
    buffer: BytesMut,
}

impl<'a> MultipartUploader<'a> {
    pub async fn new(
        backend: &'a dyn ObjectBackend,
        key: &str,
        content_type: &str,
        part_size: usize,
    ) -> StorageResult<Self> {
        let upload_id = backend.create_multipart_upload(key, content_type).await?;

        Ok(Self {
            backend,
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            part_size,
            buffer: BytesMut::with_capacity(part_size),
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.buffer.extend_from_slice(chunk);

        while self.buffer.len() >= self.part_size {
            let part = self.buffer.split_to(self.part_size).freeze();
            self.flush_part(part).await?;
        }

        Ok(())
    }

    async fn flush_part(&mut self, body: Bytes) -> StorageResult<()> {
        if body.is_empty() {
            return Ok(());
        }

        debug!(key = %self.key, part = self.part_number, "Uploading part");
        let part = self
            .backend
            .upload_part(&self.key, &self.upload_id, self.part_number, body)
            .await?;

        self.parts.push(part);
        self.part_number += 1;

        Ok(())
    }

    pub async fn finish(&mut self) -> StorageResult<()> {
        // Upload remaining buffer as last part
        let rest = self.buffer.split().freeze();
        self.flush_part(rest).await?;

        let parts = std::mem::take(&mut self.parts);
        self.backend
            .complete_multipart_upload(&self.key, &self.upload_id, parts)
            .await
    }

    pub async fn abort(&self) -> StorageResult<()> {
        self.backend
            .abort_multipart_upload(&self.key, &self.upload_id)
            .await
    }
}

/// Streams `reader` into `key`. Bodies smaller than one part go up as a
/// single put; larger ones use a multipart upload that is aborted on error.
pub async fn stream_to_backend<R>(
    backend: &dyn ObjectBackend,
    key: &str,
    reader: R,
    content_type: &str,
    part_size: usize,
) -> StorageResult<u64>
where
    R: AsyncRead + Send + Unpin,
{
    let mut stream = ReaderStream::with_capacity(reader, 64 * 1024);
    let mut head = BytesMut::new();
    let mut total: u64 = 0;

    // Buffer up to one part before deciding how to upload
    while head.len() < part_size {
        match stream.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                total += chunk.len() as u64;
                head.extend_from_slice(&chunk);
            }
            None => {
                backend.put(key, head.freeze(), content_type).await?;
                return Ok(total);
            }
        }
    }

    let mut uploader = MultipartUploader::new(backend, key, content_type, part_size).await?;

    if let Err(e) = uploader.write_chunk(&head).await {
        error!("Upload error: {}", e);
        uploader.abort().await?;
        return Err(e);
    }

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                uploader.abort().await?;
                return Err(StorageError::upload_failed(format!("Stream interrupted: {}", e)));
            }
        };
        total += chunk.len() as u64;

        if let Err(e) = uploader.write_chunk(&chunk).await {
            error!("Upload error: {}", e);
            uploader.abort().await?;
            return Err(e);
        }
    }

    if let Err(e) = uploader.finish().await {
        error!("Upload error: {}", e);
        uploader.abort().await?;
        return Err(e);
    }
    Ok(total)
}
