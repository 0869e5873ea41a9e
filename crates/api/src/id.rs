//! Types dealing with blob and node identity.

use crate::*;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

/// The only blob id layout version this crate reads and writes.
pub const BLOB_ID_VERSION: u16 = 1;

// version + account + container + partition + unique length
const BLOB_ID_HEADER_LEN: usize = 2 + 2 + 2 + 8 + 2;

/// Identifies a stored blob.
///
/// The id is a fixed-format handle, encoded big-endian as:
///
/// ```text
/// | version u16 | account u16 | container u16 | partition u64 |
/// | unique len u16 | unique bytes ... |
/// ```
///
/// It displays (and parses) as url-safe base64 of that encoding.
/// The id is immutable once constructed and is the correlation key
/// for every operation that reads the blob.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobId {
    account_id: u16,
    container_id: u16,
    partition_id: u64,
    unique: Bytes,
}

impl BlobId {
    /// Construct a new blob id.
    ///
    /// The unique part must be non-empty and fit the u16 length prefix of
    /// the binary layout.
    pub fn new(
        account_id: u16,
        container_id: u16,
        partition_id: u64,
        unique: Bytes,
    ) -> BrResult<Self> {
        if unique.is_empty() || unique.len() > u16::MAX as usize {
            return Err(BrError::invalid(
                "blob id",
                format!(
                    "unique part must be 1 to {} bytes, got {}",
                    u16::MAX,
                    unique.len()
                ),
            ));
        }
        Ok(Self {
            account_id,
            container_id,
            partition_id,
            unique,
        })
    }

    /// The account that owns this blob.
    pub fn account_id(&self) -> u16 {
        self.account_id
    }

    /// The container within the account that holds this blob.
    pub fn container_id(&self) -> u16 {
        self.container_id
    }

    /// The partition the blob was placed in. The topology uses this
    /// to look up the replica set.
    pub fn partition_id(&self) -> u64 {
        self.partition_id
    }

    /// The unique part of the id addressing the blob.
    pub fn unique(&self) -> &Bytes {
        &self.unique
    }

    /// Encode this id into its fixed binary layout.
    pub fn to_bytes(&self) -> Bytes {
        let mut out =
            BytesMut::with_capacity(BLOB_ID_HEADER_LEN + self.unique.len());
        out.put_u16(BLOB_ID_VERSION);
        out.put_u16(self.account_id);
        out.put_u16(self.container_id);
        out.put_u64(self.partition_id);
        // bounded by the check in `new`
        out.put_u16(self.unique.len() as u16);
        out.put_slice(&self.unique);
        out.freeze()
    }

    /// Decode an id from its fixed binary layout.
    pub fn from_bytes(mut data: Bytes) -> BrResult<Self> {
        if data.len() < BLOB_ID_HEADER_LEN {
            return Err(BrError::invalid("blob id", format!(
                "blob id too short: {} bytes",
                data.len()
            )));
        }
        let version = data.get_u16();
        if version != BLOB_ID_VERSION {
            return Err(BrError::invalid("blob id", format!(
                "unsupported blob id version: {version}"
            )));
        }
        let account_id = data.get_u16();
        let container_id = data.get_u16();
        let partition_id = data.get_u64();
        let unique_len = data.get_u16() as usize;
        if unique_len == 0 || unique_len != data.len() {
            return Err(BrError::invalid("blob id", format!(
                "blob id unique length {unique_len} does not match remaining {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            account_id,
            container_id,
            partition_id,
            unique: data,
        })
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use base64::prelude::*;
        f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }
}

impl std::fmt::Debug for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for BlobId {
    type Err = BrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use base64::prelude::*;
        let data = BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| BrError::decode("blob id", e))?;
        Self::from_bytes(data.into())
    }
}

/// Identifies a storage node, in `host:port` form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Construct a node id from a host and a port.
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{host}:{port}").into_boxed_str().into())
    }

    /// The `host:port` string form of this id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
