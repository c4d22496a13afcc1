//! Lazily materialized record payloads.
//!
//! A payload that travelled inline is held from the start. A larger one is
//! fetched with a single records read by id on first access, then served from
//! the cache. Concurrent first accesses share one fetch.

use std::sync::Arc;

use bytes::Bytes;
use dwn_protocol::messages::decode_data;
use dwn_protocol::{compute_cid, Message, RecordsFilter, Status};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::dispatcher::Target;
use crate::dwn::ClientContext;
use crate::error::{Error, Result, TransportError};

/// Where a detached payload can be fetched from.
pub(crate) struct FetchSource {
    pub(crate) ctx: Arc<ClientContext>,
    pub(crate) origin: Target,
    pub(crate) record_id: String,
}

/// The payload of a record.
pub struct RecordData {
    cid: String,
    size: u64,
    format: String,
    cache: OnceCell<Bytes>,
    source: Option<FetchSource>,
}

impl RecordData {
    /// Payload already in hand.
    pub(crate) fn resolved(cid: String, size: u64, format: String, bytes: Bytes) -> Self {
        Self {
            cid,
            size,
            format,
            cache: OnceCell::new_with(Some(bytes)),
            source: None,
        }
    }

    /// Payload to be fetched from `source` on first access.
    pub(crate) fn detached(cid: String, size: u64, format: String, source: FetchSource) -> Self {
        Self {
            cid,
            size,
            format,
            cache: OnceCell::new(),
            source: Some(source),
        }
    }

    /// CID of the payload.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Declared data format.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Whether the payload is available without a fetch.
    pub fn is_cached(&self) -> bool {
        self.cache.initialized()
    }

    /// The payload bytes.
    pub async fn bytes(&self) -> Result<Bytes> {
        self.cache
            .get_or_try_init(|| self.fetch())
            .await
            .map(Bytes::clone)
    }

    /// The payload as UTF-8 text.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Validation(format!("data is not UTF-8 text: {}", e)))
    }

    /// The payload parsed as JSON.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Validation(format!("data not parseable into a JSON object: {}", e)))
    }

    async fn fetch(&self) -> Result<Bytes> {
        let source = self.source.as_ref().ok_or_else(|| {
            Error::Operation("record data is neither cached nor fetchable".to_string())
        })?;
        let ctx = &source.ctx;

        tracing::debug!(
            record_id = %source.record_id,
            origin = %source.origin,
            size = self.size,
            "Fetching record data"
        );
        let read = ctx
            .builder
            .records_read(&ctx.connected_did, RecordsFilter::by_record_id(&source.record_id))?;
        let reply = ctx
            .dispatcher
            .dispatch(
                &source.origin,
                &ctx.connected_did,
                Message::RecordsRead(read),
                None,
            )
            .await?;

        match reply.status.code {
            Status::NOT_FOUND => {
                return Err(Error::NotFound(format!(
                    "record {} no longer exists at {}",
                    source.record_id, source.origin
                )))
            }
            Status::UNAUTHORIZED => return Err(Error::Authorization(reply.status.detail)),
            Status::OK => {}
            code => {
                return Err(TransportError::UnexpectedStatus {
                    code,
                    detail: reply.status.detail,
                }
                .into())
            }
        }

        let entry = reply.record.ok_or_else(|| {
            TransportError::Malformed("read reply carries no record".to_string())
        })?;
        let bytes = Bytes::from(
            decode_data(&entry.data).map_err(|e| TransportError::Malformed(e.to_string()))?,
        );
        if compute_cid(&bytes) != self.cid {
            return Err(TransportError::Malformed(format!(
                "fetched data of record {} does not match dataCid {}",
                source.record_id, self.cid
            ))
            .into());
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for RecordData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordData")
            .field("cid", &self.cid)
            .field("size", &self.size)
            .field("format", &self.format)
            .field("cached", &self.is_cached())
            .finish()
    }
}
