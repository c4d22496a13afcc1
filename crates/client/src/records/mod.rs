//! Records facade.
//!
//! Requests are built and signed for the connected DID, dispatched to the
//! local store or to `from`, and turned into [`Record`] handles.

mod data;
mod record;

pub use data::RecordData;
pub use record::Record;

use std::sync::Arc;

use bytes::Bytes;
use dwn_protocol::messages::{decode_data, DateSort, Pagination};
use dwn_protocol::{Message, RecordsFilter, RecordsWriteMessage, Status};

use crate::builder::{DataInput, WriteFields};
use crate::dispatcher::Target;
use crate::dwn::ClientContext;
use crate::error::Result;

/// A records write request.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub data: DataInput,
    pub message: WriteFields,
    /// Persist in the local store. `false` still yields a usable handle.
    pub store: bool,
}

impl WriteRequest {
    /// A request storing `data` locally with no descriptor fields set.
    pub fn new(data: impl Into<DataInput>) -> Self {
        Self {
            data: data.into(),
            message: WriteFields::default(),
            store: true,
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.message.schema = Some(schema.into());
        self
    }

    pub fn data_format(mut self, format: impl Into<String>) -> Self {
        self.message.data_format = Some(format.into());
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>, path: impl Into<String>) -> Self {
        self.message.protocol = Some(protocol.into());
        self.message.protocol_path = Some(path.into());
        self
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.message.recipient = Some(recipient.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.message.published = Some(published);
        self
    }

    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }
}

/// A request for a new record derived from an existing one.
#[derive(Debug, Clone)]
pub struct CreateFromRequest {
    /// Signing DID; defaults to the base record's author.
    pub author: Option<String>,
    pub data: DataInput,
    pub store: bool,
}

impl CreateFromRequest {
    pub fn new(data: impl Into<DataInput>) -> Self {
        Self {
            author: None,
            data: data.into(),
            store: true,
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }
}

/// A records read request.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Remote DID to read from; the local store when absent.
    pub from: Option<String>,
    pub filter: RecordsFilter,
}

impl ReadRequest {
    /// Reads one record by id from the local store.
    pub fn by_id(record_id: impl Into<String>) -> Self {
        Self {
            from: None,
            filter: RecordsFilter::by_record_id(record_id),
        }
    }

    pub fn from(mut self, did: impl Into<String>) -> Self {
        self.from = Some(did.into());
        self
    }
}

/// A records query request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub from: Option<String>,
    pub filter: RecordsFilter,
    pub date_sort: Option<DateSort>,
    pub pagination: Option<Pagination>,
}

impl QueryRequest {
    pub fn new(filter: RecordsFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn from(mut self, did: impl Into<String>) -> Self {
        self.from = Some(did.into());
        self
    }
}

/// A records delete request.
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub from: Option<String>,
    pub record_id: String,
}

impl DeleteRequest {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            from: None,
            record_id: record_id.into(),
        }
    }

    pub fn from(mut self, did: impl Into<String>) -> Self {
        self.from = Some(did.into());
        self
    }
}

/// Outcome of a write: the status and, unless rejected, the record.
#[derive(Debug)]
pub struct WriteResult {
    pub status: Status,
    pub record: Option<Record>,
}

/// Outcome of a read.
#[derive(Debug)]
pub struct ReadResult {
    pub status: Status,
    pub record: Option<Record>,
}

/// Outcome of a query. `records` is empty unless the status is 200.
#[derive(Debug)]
pub struct QueryResult {
    pub status: Status,
    pub records: Vec<Record>,
    /// Resume point when the result was truncated by pagination.
    pub cursor: Option<String>,
}

/// Outcome of a delete.
#[derive(Debug)]
pub struct DeleteResult {
    pub status: Status,
}

/// Records operations for the connected DID.
pub struct Records<'a> {
    ctx: &'a Arc<ClientContext>,
}

impl<'a> Records<'a> {
    pub(crate) fn new(ctx: &'a Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    /// Alias of [`Records::write`].
    pub async fn create(&self, request: WriteRequest) -> Result<WriteResult> {
        self.write(request).await
    }

    /// Writes a new record authored by the connected DID.
    pub async fn write(&self, request: WriteRequest) -> Result<WriteResult> {
        let signed = self.ctx.builder.records_write(
            &self.ctx.connected_did,
            request.message,
            request.data,
        )?;
        self.submit(signed.message, signed.data, request.store).await
    }

    /// Writes a new record under `base`, inheriting its descriptor fields.
    ///
    /// The new record's `parentId` is the base's id and, for protocol
    /// records, its context is the base's context.
    pub async fn create_from(&self, base: &Record, request: CreateFromRequest) -> Result<WriteResult> {
        let author = request
            .author
            .unwrap_or_else(|| base.author().to_string());
        let fields = WriteFields {
            protocol: base.protocol().map(str::to_string),
            protocol_path: base.protocol_path().map(str::to_string),
            schema: base.schema().map(str::to_string),
            data_format: Some(base.data_format().to_string()),
            recipient: base.recipient().map(str::to_string),
            parent_id: Some(base.id().to_string()),
            parent_context_id: base.context_id().map(str::to_string),
            published: base.published().then_some(true),
            ..Default::default()
        };

        let signed = self.ctx.builder.records_write(&author, fields, request.data)?;
        self.submit(signed.message, signed.data, request.store).await
    }

    async fn submit(
        &self,
        message: RecordsWriteMessage,
        data: Bytes,
        store: bool,
    ) -> Result<WriteResult> {
        if !store {
            let record = Record::from_signed(self.ctx.clone(), message, data, false)?;
            return Ok(WriteResult {
                status: Status::accepted(),
                record: Some(record),
            });
        }

        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &Target::Local,
                &self.ctx.connected_did,
                Message::RecordsWrite(message.without_data()),
                Some(data.clone()),
            )
            .await?;

        let record = match reply.status.code {
            Status::ACCEPTED | Status::OK => {
                Some(Record::from_signed(self.ctx.clone(), message, data, true)?)
            }
            _ => None,
        };
        Ok(WriteResult {
            status: reply.status,
            record,
        })
    }

    /// Reads one record matching `request.filter`.
    pub async fn read(&self, request: ReadRequest) -> Result<ReadResult> {
        let origin = Target::from_option(request.from);
        let message = self
            .ctx
            .builder
            .records_read(&self.ctx.connected_did, request.filter)?;
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &origin,
                &self.ctx.connected_did,
                Message::RecordsRead(message),
                None,
            )
            .await?;

        let record = match reply.record {
            Some(entry) if reply.status.code == Status::OK => {
                let data = Bytes::from(decode_data(&entry.data)?);
                Some(Record::from_reply(
                    self.ctx.clone(),
                    entry.records_write,
                    origin,
                    Some(data),
                )?)
            }
            _ => None,
        };
        Ok(ReadResult {
            status: reply.status,
            record,
        })
    }

    /// Queries records matching `request.filter`, in node order.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResult> {
        let origin = Target::from_option(request.from);
        let message = self.ctx.builder.records_query(
            &self.ctx.connected_did,
            request.filter,
            request.date_sort,
            request.pagination,
        )?;
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &origin,
                &self.ctx.connected_did,
                Message::RecordsQuery(message),
                None,
            )
            .await?;

        let records = reply
            .entries
            .into_iter()
            .map(|entry| Record::from_reply(self.ctx.clone(), entry, origin.clone(), None))
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryResult {
            status: reply.status,
            records,
            cursor: reply.cursor,
        })
    }

    /// Deletes a record by id, locally or at `request.from`.
    pub async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult> {
        let origin = Target::from_option(request.from);
        let message = self
            .ctx
            .builder
            .records_delete(&self.ctx.connected_did, &request.record_id)?;
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &origin,
                &self.ctx.connected_did,
                Message::RecordsDelete(message),
                None,
            )
            .await?;
        Ok(DeleteResult {
            status: reply.status,
        })
    }
}
