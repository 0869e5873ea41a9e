//! Blob record payload types and the decoder collaborator.

use crate::*;
use bytes::Bytes;
use std::sync::Arc;

/// The blob content returned by a successful get.
///
/// Cloning is cheap, the content is reference counted. Reading the
/// content any number of times yields the same bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobOutput {
    size: u64,
    data: Bytes,
}

impl std::fmt::Debug for BlobOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobOutput")
            .field("size", &self.size)
            .finish()
    }
}

impl BlobOutput {
    /// Construct a blob output. The declared size must match the
    /// content length, decoders are expected to have validated this.
    pub fn new(size: u64, data: Bytes) -> BrResult<Self> {
        if size != data.len() as u64 {
            return Err(BrError::invalid("blob output", format!(
                "declared blob size {size} does not match content length {}",
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    /// The declared size of the blob.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The full blob content.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the content as a stream of chunks of at most `chunk_size`
    /// bytes.
    pub fn into_stream(
        self,
        chunk_size: usize,
    ) -> impl futures::Stream<Item = Bytes> + Send + 'static {
        let chunk_size = chunk_size.max(1);
        let mut data = self.data;
        let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
        while !data.is_empty() {
            let n = chunk_size.min(data.len());
            chunks.push(data.split_to(n));
        }
        futures::stream::iter(chunks)
    }
}

/// System properties stored with a blob at upload time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    /// Size of the blob content in bytes.
    pub blob_size: u64,
    /// Content type given at upload.
    pub content_type: String,
    /// The service that uploaded the blob.
    pub service_id: String,
    /// The owner of the blob.
    pub owner_id: String,
    /// Upload time in milliseconds since the unix epoch.
    pub creation_time_ms: i64,
    /// Time to live in seconds, `None` if the blob never expires.
    pub time_to_live_secs: Option<i64>,
}

/// Decodes record bodies returned by storage nodes.
///
/// Any failure to decode is reported by the coordinator as a corrupt
/// replica, it is never treated as "not found".
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait BlobDecoder: 'static + Send + Sync + std::fmt::Debug {
    /// Decode a blob content record.
    fn decode_blob(&self, body: Bytes) -> BrResult<BlobOutput>;

    /// Decode a blob properties record.
    fn decode_blob_properties(&self, body: Bytes) -> BrResult<BlobProperties>;

    /// Decode a user metadata record.
    fn decode_user_metadata(&self, body: Bytes) -> BrResult<Bytes>;
}

/// Trait-object [BlobDecoder].
pub type DynBlobDecoder = Arc<dyn BlobDecoder>;
