//! Blobrouter wire protocol types.
//!
//! Requests and responses exchanged with storage nodes are prost
//! messages. Only the "get" exchange is used by the read coordinator.

use crate::*;
use bytes::Bytes;
use prost::Message;

/// Which part of a stored blob record a get request asks for.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration,
)]
#[repr(i32)]
pub enum MessageFormatFlags {
    /// The blob content.
    Blob = 0,
    /// The blob properties.
    BlobProperties = 1,
    /// The opaque user metadata stored alongside the blob.
    BlobUserMetadata = 2,
}

/// Error code returned by a storage node in a [GetResponse].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration,
)]
#[repr(i32)]
pub enum ServerErrorCode {
    /// The request was served, the body holds the requested record.
    NoError = 0,
    /// The node hit an I/O error reading the record.
    IoError = 1,
    /// The node found the stored record to be corrupt.
    DataCorrupt = 2,
    /// The node does not have the blob.
    BlobNotFound = 3,
    /// The blob was deleted.
    BlobDeleted = 4,
    /// The blob's time to live has passed.
    BlobExpired = 5,
    /// The node does not host the blob's partition.
    PartitionUnknown = 6,
    /// The disk holding the replica is unavailable.
    DiskUnavailable = 7,
    /// The replica is unavailable (e.g. stopped or bootstrapping).
    ReplicaUnavailable = 8,
    /// Any other node-side failure.
    UnknownError = 9,
}

/// A request to read (part of) a blob from a single replica.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetRequest {
    /// Correlates the response with the operation that sent the request.
    #[prost(uint64, tag = "1")]
    pub correlation_id: u64,
    /// Identifies the client process to the storage node.
    #[prost(string, tag = "2")]
    pub client_id: String,
    /// Which part of the record to return.
    #[prost(enumeration = "MessageFormatFlags", tag = "3")]
    pub flags: i32,
    /// The binary [BlobId] of the blob to read.
    #[prost(bytes = "bytes", tag = "4")]
    pub blob_id: Bytes,
}

/// A storage node's answer to a [GetRequest].
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetResponse {
    /// The correlation id of the request being answered.
    #[prost(uint64, tag = "1")]
    pub correlation_id: u64,
    /// The node-side outcome of the request.
    #[prost(enumeration = "ServerErrorCode", tag = "2")]
    pub server_error: i32,
    /// The encoded record when `server_error` is `NoError`.
    #[prost(bytes = "bytes", tag = "3")]
    pub body: Bytes,
}

impl GetResponse {
    /// The server error code, or an error if the node sent a code
    /// this crate does not know.
    pub fn error_code(&self) -> BrResult<ServerErrorCode> {
        ServerErrorCode::try_from(self.server_error)
            .map_err(|err| BrError::decode("server error code", err))
    }
}

/// Serialize a get request.
pub fn serialize_get_request(
    correlation_id: u64,
    client_id: &str,
    flags: MessageFormatFlags,
    blob_id: &BlobId,
) -> Bytes {
    GetRequest {
        correlation_id,
        client_id: client_id.to_string(),
        flags: flags.into(),
        blob_id: blob_id.to_bytes(),
    }
    .encode_to_vec()
    .into()
}

/// Deserialize a get request.
pub fn deserialize_get_request(data: Bytes) -> BrResult<GetRequest> {
    GetRequest::decode(data)
        .map_err(|err| BrError::decode("get request", err))
}

/// Serialize a get response.
pub fn serialize_get_response(
    correlation_id: u64,
    server_error: ServerErrorCode,
    body: Bytes,
) -> Bytes {
    GetResponse {
        correlation_id,
        server_error: server_error.into(),
        body,
    }
    .encode_to_vec()
    .into()
}

/// Deserialize a get response.
pub fn deserialize_get_response(data: Bytes) -> BrResult<GetResponse> {
    GetResponse::decode(data)
        .map_err(|err| BrError::decode("get response", err))
}
