//! The client-side handle to one logical record.

use std::sync::Arc;

use bytes::Bytes;
use dwn_protocol::messages::{decode_data, EncryptionProperty};
use dwn_protocol::{GeneralJws, Message, RecordsWriteMessage, Status};

use super::data::{FetchSource, RecordData};
use crate::builder::RecordUpdate;
use crate::dispatcher::Target;
use crate::dwn::ClientContext;
use crate::error::{Error, Result};

/// A record as last written through, or received by, this client.
///
/// The handle dispatches to its origin: the local store for records the
/// agent wrote or read locally, the remote DID's node for records read
/// `from` another DID. Handles are not shared; mutation goes through
/// `&mut self`.
pub struct Record {
    ctx: Arc<ClientContext>,
    message: RecordsWriteMessage,
    author: String,
    target: String,
    origin: Target,
    stored: bool,
    deleted: bool,
    data: RecordData,
}

impl Record {
    /// Handle for a write this client just built, with its payload in hand.
    pub(crate) fn from_signed(
        ctx: Arc<ClientContext>,
        message: RecordsWriteMessage,
        data: Bytes,
        stored: bool,
    ) -> Result<Self> {
        let author = message.authorization.author()?;
        let target = ctx.connected_did.clone();
        let record_data = RecordData::resolved(
            message.descriptor.data_cid.clone(),
            message.descriptor.data_size,
            message.descriptor.data_format.clone(),
            data,
        );
        Ok(Self {
            ctx,
            message: message.without_data(),
            author,
            target,
            origin: Target::Local,
            stored,
            deleted: false,
            data: record_data,
        })
    }

    /// Handle for a write returned by a node.
    ///
    /// `data` is the full payload when the reply carried it; otherwise the
    /// message's inline payload is used, and failing that the payload is
    /// fetched from `origin` on first access.
    pub(crate) fn from_reply(
        ctx: Arc<ClientContext>,
        message: RecordsWriteMessage,
        origin: Target,
        data: Option<Bytes>,
    ) -> Result<Self> {
        let author = message.authorization.author()?;
        let target = origin.tenant(&ctx.connected_did).to_string();

        let inline = match (data, message.encoded_data.as_deref()) {
            (Some(bytes), _) => Some(bytes),
            (None, Some(encoded)) => Some(Bytes::from(decode_data(encoded)?)),
            (None, None) => None,
        };

        let descriptor = &message.descriptor;
        let record_data = match inline {
            Some(bytes) => RecordData::resolved(
                descriptor.data_cid.clone(),
                descriptor.data_size,
                descriptor.data_format.clone(),
                bytes,
            ),
            None => RecordData::detached(
                descriptor.data_cid.clone(),
                descriptor.data_size,
                descriptor.data_format.clone(),
                FetchSource {
                    ctx: ctx.clone(),
                    origin: origin.clone(),
                    record_id: message.record_id.clone(),
                },
            ),
        };

        Ok(Self {
            message: message.without_data(),
            author,
            target,
            stored: true,
            deleted: false,
            data: record_data,
            origin,
            ctx,
        })
    }

    pub fn id(&self) -> &str {
        &self.message.record_id
    }

    pub fn context_id(&self) -> Option<&str> {
        self.message.context_id.as_deref()
    }

    /// DID that signed the initial write.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// DID whose store holds the record.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn protocol(&self) -> Option<&str> {
        self.message.descriptor.protocol.as_deref()
    }

    pub fn protocol_path(&self) -> Option<&str> {
        self.message.descriptor.protocol_path.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.message.descriptor.schema.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.message.descriptor.recipient.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.message.descriptor.parent_id.as_deref()
    }

    pub fn data_format(&self) -> &str {
        &self.message.descriptor.data_format
    }

    pub fn data_cid(&self) -> &str {
        &self.message.descriptor.data_cid
    }

    pub fn data_size(&self) -> u64 {
        self.message.descriptor.data_size
    }

    pub fn date_created(&self) -> &str {
        &self.message.descriptor.date_created
    }

    /// Timestamp of the latest write.
    pub fn date_modified(&self) -> &str {
        &self.message.descriptor.message_timestamp
    }

    pub fn published(&self) -> bool {
        self.message.descriptor.is_published()
    }

    pub fn date_published(&self) -> Option<&str> {
        self.message.descriptor.date_published.as_deref()
    }

    pub fn encryption(&self) -> Option<&EncryptionProperty> {
        self.message.encryption.as_ref()
    }

    pub fn attestation(&self) -> Option<&GeneralJws> {
        self.message.attestation.as_ref()
    }

    /// The latest write message, without payload.
    pub fn message(&self) -> &RecordsWriteMessage {
        &self.message
    }

    /// The record's payload.
    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Whether the handle has been deleted through [`Record::delete`].
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether the record was persisted at its origin.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// Writes a new version of the record to its origin.
    ///
    /// Immutable fields are rejected before anything is built. On 202 the
    /// handle moves to the new version; other statuses leave it unchanged.
    /// A local record created with `store: false` is updated in place
    /// without dispatch.
    pub async fn update(&mut self, update: RecordUpdate) -> Result<Status> {
        self.ensure_live("update")?;
        let (message, data) = self.ctx.builder.records_update(&self.message, update)?;

        let status = if self.origin == Target::Local && !self.stored {
            Status::accepted()
        } else {
            self.ctx
                .dispatcher
                .dispatch(
                    &self.origin,
                    &self.ctx.connected_did,
                    Message::RecordsWrite(message.clone()),
                    data.clone(),
                )
                .await?
                .status
        };

        if status.code == Status::ACCEPTED {
            if let Some(bytes) = data {
                self.data = RecordData::resolved(
                    message.descriptor.data_cid.clone(),
                    message.descriptor.data_size,
                    message.descriptor.data_format.clone(),
                    bytes,
                );
            }
            tracing::debug!(record_id = %self.id(), "Updated record");
            self.message = message;
        }
        Ok(status)
    }

    /// Deletes the record at its origin.
    ///
    /// The handle becomes terminal once the origin accepts the delete or
    /// reports the record missing; any further `update`, `delete` or `send`
    /// fails with [`Error::Operation`].
    pub async fn delete(&mut self) -> Result<Status> {
        self.ensure_live("delete")?;

        let status = if self.origin == Target::Local && !self.stored {
            Status::accepted()
        } else {
            let delete = self
                .ctx
                .builder
                .records_delete(&self.ctx.connected_did, self.id())?;
            self.ctx
                .dispatcher
                .dispatch(
                    &self.origin,
                    &self.ctx.connected_did,
                    Message::RecordsDelete(delete),
                    None,
                )
                .await?
                .status
        };

        if matches!(status.code, Status::ACCEPTED | Status::NOT_FOUND) {
            self.deleted = true;
        }
        Ok(status)
    }

    /// Replicates the current version of the record to `target_did`'s node.
    ///
    /// Local state, including whether the record is stored locally, is left
    /// untouched.
    pub async fn send(&self, target_did: &str) -> Result<Status> {
        self.ensure_live("send")?;
        let data = self.data.bytes().await?;

        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &Target::Remote(target_did.to_string()),
                &self.ctx.connected_did,
                Message::RecordsWrite(self.message.clone()),
                Some(data),
            )
            .await?;
        tracing::debug!(record_id = %self.id(), to = target_did, code = reply.status.code, "Sent record");
        Ok(reply.status)
    }

    fn ensure_live(&self, operation: &str) -> Result<()> {
        if self.deleted {
            return Err(Error::Operation(format!(
                "cannot {} record {}: it has been deleted",
                operation,
                self.id()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id())
            .field("author", &self.author)
            .field("target", &self.target)
            .field("origin", &self.origin)
            .field("stored", &self.stored)
            .field("deleted", &self.deleted)
            .field("data", &self.data)
            .finish()
    }
}
