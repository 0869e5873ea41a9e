//! The get operation kinds.
//!
//! A kind only knows which part of the record to ask for and how to
//! decode a successful response body. Dispatch and resolution are shared
//! by every kind in [Operation](super::Operation).

use super::Operation;
use blobrouter_api::*;
use bytes::Bytes;

/// The capability set an operation variant supplies to the coordinator.
pub trait OperationKind: 'static + Send + Sync {
    /// The payload a successful operation yields.
    type Output: 'static + Clone + Send + Sync + std::fmt::Debug;

    /// Name used in logs.
    const NAME: &'static str;

    /// The part of the record to request.
    const FLAGS: MessageFormatFlags;

    /// The metric kind per-replica requests are recorded under.
    const METRIC: MetricKind;

    /// Decode the body of a successful response.
    fn decode(
        decoder: &dyn BlobDecoder,
        body: Bytes,
    ) -> BrResult<Self::Output>;
}

/// Get the blob content.
#[derive(Debug)]
pub struct GetBlob;

impl OperationKind for GetBlob {
    type Output = BlobOutput;
    const NAME: &'static str = "GetBlob";
    const FLAGS: MessageFormatFlags = MessageFormatFlags::Blob;
    const METRIC: MetricKind = MetricKind::GetBlobRequest;

    fn decode(
        decoder: &dyn BlobDecoder,
        body: Bytes,
    ) -> BrResult<Self::Output> {
        decoder.decode_blob(body)
    }
}

/// Get the blob properties.
#[derive(Debug)]
pub struct GetBlobProperties;

impl OperationKind for GetBlobProperties {
    type Output = BlobProperties;
    const NAME: &'static str = "GetBlobProperties";
    const FLAGS: MessageFormatFlags = MessageFormatFlags::BlobProperties;
    const METRIC: MetricKind = MetricKind::GetBlobPropertiesRequest;

    fn decode(
        decoder: &dyn BlobDecoder,
        body: Bytes,
    ) -> BrResult<Self::Output> {
        decoder.decode_blob_properties(body)
    }
}

/// Get the blob user metadata.
#[derive(Debug)]
pub struct GetBlobUserMetadata;

impl OperationKind for GetBlobUserMetadata {
    type Output = Bytes;
    const NAME: &'static str = "GetBlobUserMetadata";
    const FLAGS: MessageFormatFlags = MessageFormatFlags::BlobUserMetadata;
    const METRIC: MetricKind = MetricKind::GetBlobUserMetadataRequest;

    fn decode(
        decoder: &dyn BlobDecoder,
        body: Bytes,
    ) -> BrResult<Self::Output> {
        decoder.decode_user_metadata(body)
    }
}

/// An operation reading blob content.
pub type GetBlobOperation = Operation<GetBlob>;

impl GetBlobOperation {
    /// The blob content, once the operation resolved successfully.
    ///
    /// Fails with [CoordinatorErrorKind::UnexpectedInternalError] if called
    /// before resolution or after a failed resolution.
    pub fn blob_output(&self) -> Result<BlobOutput, CoordinatorError> {
        self.payload()
    }
}
