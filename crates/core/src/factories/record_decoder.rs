//! The default record decoder.
//!
//! Record bodies are prost messages carrying a format version. Anything
//! that does not decode, carries an unknown version, or declares a size
//! that does not match its content is rejected.

use blobrouter_api::*;
use bytes::Bytes;
use prost::Message;
use std::sync::Arc;

/// The record format version this decoder understands.
pub const RECORD_VERSION: u32 = 1;

/// Blob content record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BlobRecord {
    /// Record format version.
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// Declared content size.
    #[prost(uint64, tag = "2")]
    pub size: u64,
    /// The content.
    #[prost(bytes = "bytes", tag = "3")]
    pub data: Bytes,
}

/// Blob properties record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BlobPropertiesRecord {
    /// Record format version.
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// See [BlobProperties::blob_size].
    #[prost(uint64, tag = "2")]
    pub blob_size: u64,
    /// See [BlobProperties::content_type].
    #[prost(string, tag = "3")]
    pub content_type: String,
    /// See [BlobProperties::service_id].
    #[prost(string, tag = "4")]
    pub service_id: String,
    /// See [BlobProperties::owner_id].
    #[prost(string, tag = "5")]
    pub owner_id: String,
    /// See [BlobProperties::creation_time_ms].
    #[prost(int64, tag = "6")]
    pub creation_time_ms: i64,
    /// See [BlobProperties::time_to_live_secs].
    #[prost(int64, optional, tag = "7")]
    pub time_to_live_secs: Option<i64>,
}

/// User metadata record.
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserMetadataRecord {
    /// Record format version.
    #[prost(uint32, tag = "1")]
    pub version: u32,
    /// The opaque metadata.
    #[prost(bytes = "bytes", tag = "2")]
    pub metadata: Bytes,
}

/// Encode blob content as a record body.
pub fn encode_blob_record(data: Bytes) -> Bytes {
    BlobRecord {
        version: RECORD_VERSION,
        size: data.len() as u64,
        data,
    }
    .encode_to_vec()
    .into()
}

/// Encode blob properties as a record body.
pub fn encode_blob_properties_record(properties: &BlobProperties) -> Bytes {
    BlobPropertiesRecord {
        version: RECORD_VERSION,
        blob_size: properties.blob_size,
        content_type: properties.content_type.clone(),
        service_id: properties.service_id.clone(),
        owner_id: properties.owner_id.clone(),
        creation_time_ms: properties.creation_time_ms,
        time_to_live_secs: properties.time_to_live_secs,
    }
    .encode_to_vec()
    .into()
}

/// Encode user metadata as a record body.
pub fn encode_user_metadata_record(metadata: Bytes) -> Bytes {
    UserMetadataRecord {
        version: RECORD_VERSION,
        metadata,
    }
    .encode_to_vec()
    .into()
}

fn check_version(what: &str, version: u32) -> BrResult<()> {
    if version != RECORD_VERSION {
        return Err(BrError::invalid(
            what,
            format!("unsupported record version {version}"),
        ));
    }
    Ok(())
}

/// Decoder for the records produced by the `encode_*` functions here.
#[derive(Debug)]
pub struct RecordBlobDecoder;

impl RecordBlobDecoder {
    /// Construct a new RecordBlobDecoder.
    pub fn create() -> DynBlobDecoder {
        let out: DynBlobDecoder = Arc::new(Self);
        out
    }
}

impl BlobDecoder for RecordBlobDecoder {
    fn decode_blob(&self, body: Bytes) -> BrResult<BlobOutput> {
        let record = BlobRecord::decode(body)
            .map_err(|err| BrError::decode("blob record", err))?;
        check_version("blob record", record.version)?;
        BlobOutput::new(record.size, record.data)
    }

    fn decode_blob_properties(&self, body: Bytes) -> BrResult<BlobProperties> {
        let record = BlobPropertiesRecord::decode(body).map_err(|err| {
            BrError::decode("blob properties record", err)
        })?;
        check_version("blob properties record", record.version)?;
        Ok(BlobProperties {
            blob_size: record.blob_size,
            content_type: record.content_type,
            service_id: record.service_id,
            owner_id: record.owner_id,
            creation_time_ms: record.creation_time_ms,
            time_to_live_secs: record.time_to_live_secs,
        })
    }

    fn decode_user_metadata(&self, body: Bytes) -> BrResult<Bytes> {
        let record = UserMetadataRecord::decode(body).map_err(|err| {
            BrError::decode("user metadata record", err)
        })?;
        check_version("user metadata record", record.version)?;
        Ok(record.metadata)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_blob_record() {
        let decoder = RecordBlobDecoder;
        let out = decoder
            .decode_blob(encode_blob_record(Bytes::from_static(b"content")))
            .unwrap();
        assert_eq!(7, out.size());
        assert_eq!(&Bytes::from_static(b"content"), out.data());
    }

    #[test]
    fn decodes_properties_record() {
        let properties = BlobProperties {
            blob_size: 12,
            content_type: "image/png".to_string(),
            service_id: "uploader".to_string(),
            owner_id: "alice".to_string(),
            creation_time_ms: 1_700_000_000_000,
            time_to_live_secs: None,
        };
        let decoded = RecordBlobDecoder
            .decode_blob_properties(encode_blob_properties_record(&properties))
            .unwrap();
        assert_eq!(properties, decoded);
    }

    #[test]
    fn rejects_size_mismatch() {
        let body = BlobRecord {
            version: RECORD_VERSION,
            size: 100,
            data: Bytes::from_static(b"short"),
        }
        .encode_to_vec();
        RecordBlobDecoder.decode_blob(body.into()).unwrap_err();
    }

    #[test]
    fn rejects_empty_and_garbage_bodies() {
        // an empty body decodes to version 0
        RecordBlobDecoder.decode_blob(Bytes::new()).unwrap_err();
        RecordBlobDecoder
            .decode_user_metadata(Bytes::new())
            .unwrap_err();
        RecordBlobDecoder
            .decode_blob_properties(Bytes::from_static(&[0xff, 0xff, 0xff]))
            .unwrap_err();
    }
}
