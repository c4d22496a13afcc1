//! In-memory multi-tenant node.
//!
//! Serves as the agent's local store and as the far side of loopback
//! endpoints. Authorization model: a tenant (or a DID the
//! tenant granted access to) may do anything in its store; anyone may read
//! published records and discover published protocols. Non-owners may query
//! records only with `published: true` in the filter.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use dwn_protocol::messages::{
    encode_data, AttestationPayload, DateSort, ProtocolsConfigureMessage, ProtocolsQueryMessage,
    ReadEntry, RecordsDeleteMessage, RecordsQueryMessage, RecordsReadMessage,
};
use dwn_protocol::{compute_cid, GeneralJws, Message, RecordsWriteMessage, Reply, Status};
use tracing::{debug, warn};

use super::MessageNode;
use crate::resolver::DidResolver;

/// The latest write of a record and its payload.
#[derive(Debug, Clone)]
struct StoredRecord {
    message: RecordsWriteMessage,
    author: String,
    data: Bytes,
}

/// Everything one tenant's store holds.
#[derive(Debug, Default)]
struct TenantStore {
    records: HashMap<String, StoredRecord>,
    tombstones: HashSet<String>,
    protocols: HashMap<String, ProtocolsConfigureMessage>,
    grants: HashSet<String>,
}

impl TenantStore {
    fn is_permitted(&self, tenant: &str, requester: &str) -> bool {
        requester == tenant || self.grants.contains(requester)
    }
}

/// In-memory node holding any number of tenants.
pub struct MemoryNode {
    resolver: Arc<dyn DidResolver>,
    inline_threshold: usize,
    tenants: RwLock<HashMap<String, TenantStore>>,
}

impl MemoryNode {
    /// Creates a node that verifies signatures through `resolver`.
    pub fn new(resolver: Arc<dyn DidResolver>, inline_threshold: usize) -> Self {
        Self {
            resolver,
            inline_threshold,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Lets `grantee` act as owner in `tenant`'s store.
    pub fn grant(&self, tenant: &str, grantee: &str) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants
                .entry(tenant.to_string())
                .or_default()
                .grants
                .insert(grantee.to_string());
        }
    }

    /// Number of live records in a tenant's store.
    pub fn record_count(&self, tenant: &str) -> usize {
        self.tenants
            .read()
            .map(|t| t.get(tenant).map_or(0, |s| s.records.len()))
            .unwrap_or(0)
    }

    /// Checks the author signature (and any attestations) of a message.
    async fn authenticate(&self, message: &Message) -> Result<String, Status> {
        let authorization = message.authorization();
        let author = authorization
            .author()
            .map_err(|e| Status::unauthorized(e.to_string()))?;
        let payload = authorization
            .payload()
            .map_err(|e| Status::unauthorized(e.to_string()))?;
        let descriptor_cid = message
            .descriptor_cid()
            .map_err(|e| Status::bad_request(e.to_string()))?;

        if payload.descriptor_cid != descriptor_cid {
            return Err(Status::unauthorized(
                "signature payload does not match descriptor",
            ));
        }

        self.verify_jws(&authorization.signature).await?;

        if let Message::RecordsWrite(write) = message {
            if payload.record_id.as_deref() != Some(write.record_id.as_str())
                || payload.context_id != write.context_id
            {
                return Err(Status::unauthorized(
                    "signature payload does not match record identity",
                ));
            }
            if let Some(attestation) = &write.attestation {
                let attested: AttestationPayload = attestation
                    .decode_payload()
                    .map_err(|e| Status::bad_request(e.to_string()))?;
                if attested.descriptor_cid != descriptor_cid {
                    return Err(Status::unauthorized(
                        "attestation does not match descriptor",
                    ));
                }
                self.verify_jws(attestation).await?;
            }
        }

        Ok(author)
    }

    async fn verify_jws(&self, jws: &GeneralJws) -> Result<(), Status> {
        let signers = jws
            .signer_dids()
            .map_err(|e| Status::unauthorized(e.to_string()))?;
        for (index, did) in signers.iter().enumerate() {
            let document = self
                .resolver
                .resolve(did)
                .await
                .map_err(|e| Status::unauthorized(e.to_string()))?;
            jws.verify_signature(index, &document)
                .map_err(|e| Status::unauthorized(e.to_string()))?;
        }
        Ok(())
    }

    fn handle_write(
        &self,
        tenant: &str,
        author: String,
        message: RecordsWriteMessage,
        data: Option<Bytes>,
    ) -> Status {
        let Ok(mut tenants) = self.tenants.write() else {
            return Status::new(500, "store lock poisoned");
        };
        let store = tenants.entry(tenant.to_string()).or_default();

        if !store.is_permitted(tenant, &author) {
            return Status::unauthorized(format!("{} may not write to {}", author, tenant));
        }
        if store.tombstones.contains(&message.record_id) {
            return Status::not_found("record has been deleted");
        }

        let existing = store.records.get(&message.record_id);
        let descriptor = &message.descriptor;

        let data = match (data, existing) {
            (Some(data), _) => data,
            (None, Some(prev)) if prev.message.descriptor.data_cid == descriptor.data_cid => {
                prev.data.clone()
            }
            (None, _) => return Status::bad_request("data was not provided"),
        };
        if data.len() as u64 != descriptor.data_size || compute_cid(&data) != descriptor.data_cid
        {
            return Status::bad_request("data does not match dataCid/dataSize");
        }

        if let Some(prev) = existing {
            let before = &prev.message.descriptor;
            if before.message_timestamp >= descriptor.message_timestamp {
                return Status::conflict("a newer version of the record exists");
            }
            let immutable_changed = before.schema != descriptor.schema
                || before.protocol != descriptor.protocol
                || before.protocol_path != descriptor.protocol_path
                || before.data_format != descriptor.data_format
                || before.recipient != descriptor.recipient
                || before.parent_id != descriptor.parent_id
                || before.date_created != descriptor.date_created
                || prev.message.context_id != message.context_id;
            if immutable_changed {
                return Status::bad_request("immutable properties do not match the initial write");
            }
            if before.is_published() && !descriptor.is_published() {
                return Status::bad_request("a published record cannot be unpublished");
            }
        }

        debug!(tenant, record_id = %message.record_id, "Stored record");
        store.records.insert(
            message.record_id.clone(),
            StoredRecord {
                message: message.without_data(),
                author,
                data,
            },
        );
        Status::accepted()
    }

    fn handle_read(&self, tenant: &str, requester: &str, message: RecordsReadMessage) -> Reply {
        let Ok(tenants) = self.tenants.read() else {
            return Reply::status(Status::new(500, "store lock poisoned"));
        };
        let Some(store) = tenants.get(tenant) else {
            return Reply::status(Status::not_found("record not found"));
        };

        let filter = &message.descriptor.filter;
        let mut matches: Vec<&StoredRecord> = store
            .records
            .values()
            .filter(|r| {
                filter.matches(
                    &r.message.record_id,
                    &r.author,
                    &r.message.descriptor,
                    r.message.context_id.as_deref(),
                )
            })
            .collect();
        matches.sort_by(|a, b| {
            a.message
                .descriptor
                .date_created
                .cmp(&b.message.descriptor.date_created)
        });

        let Some(record) = matches.first() else {
            return Reply::status(Status::not_found("record not found"));
        };
        if !store.is_permitted(tenant, requester) && !record.message.descriptor.is_published() {
            return Reply::status(Status::unauthorized(format!(
                "{} may not read unpublished records of {}",
                requester, tenant
            )));
        }

        Reply {
            record: Some(ReadEntry {
                records_write: record.message.clone(),
                data: encode_data(&record.data),
            }),
            ..Reply::status(Status::ok())
        }
    }

    fn handle_query(&self, tenant: &str, requester: &str, message: RecordsQueryMessage) -> Reply {
        let Ok(tenants) = self.tenants.read() else {
            return Reply::status(Status::new(500, "store lock poisoned"));
        };
        let descriptor = message.descriptor;
        let store = tenants.get(tenant);
        let owner = store.map_or(requester == tenant, |s| s.is_permitted(tenant, requester));

        if !owner && descriptor.filter.published != Some(true) {
            return Reply::status(Status::unauthorized(format!(
                "{} may not query records of {}",
                requester, tenant
            )));
        }
        let Some(store) = store else {
            return Reply::status(Status::ok());
        };

        let filter = &descriptor.filter;
        let mut matches: Vec<&StoredRecord> = store
            .records
            .values()
            .filter(|r| {
                filter.matches(
                    &r.message.record_id,
                    &r.author,
                    &r.message.descriptor,
                    r.message.context_id.as_deref(),
                )
            })
            .collect();

        let sort = descriptor.date_sort.unwrap_or_default();
        matches.sort_by(|a, b| {
            let (da, db) = (&a.message.descriptor, &b.message.descriptor);
            let ord = match sort {
                DateSort::CreatedAscending | DateSort::CreatedDescending => {
                    da.date_created.cmp(&db.date_created)
                }
                DateSort::PublishedAscending | DateSort::PublishedDescending => {
                    da.date_published.cmp(&db.date_published)
                }
            }
            .then_with(|| a.message.record_id.cmp(&b.message.record_id));
            match sort {
                DateSort::CreatedDescending | DateSort::PublishedDescending => ord.reverse(),
                _ => ord,
            }
        });

        let pagination = descriptor.pagination.unwrap_or_default();
        if let Some(cursor) = &pagination.cursor {
            let Some(pos) = matches.iter().position(|r| &r.message.record_id == cursor) else {
                return Reply::status(Status::bad_request(format!(
                    "unknown pagination cursor {}",
                    cursor
                )));
            };
            matches.drain(..=pos);
        }
        let mut cursor = None;
        if let Some(limit) = pagination.limit {
            if matches.len() > limit {
                matches.truncate(limit);
                cursor = matches.last().map(|r| r.message.record_id.clone());
            }
        }

        let entries = matches
            .into_iter()
            .map(|r| {
                let mut message = r.message.clone();
                if r.data.len() <= self.inline_threshold {
                    message.encoded_data = Some(encode_data(&r.data));
                }
                message
            })
            .collect();

        Reply {
            entries,
            cursor,
            ..Reply::status(Status::ok())
        }
    }

    fn handle_delete(&self, tenant: &str, requester: &str, message: RecordsDeleteMessage) -> Status {
        let Ok(mut tenants) = self.tenants.write() else {
            return Status::new(500, "store lock poisoned");
        };
        let store = tenants.entry(tenant.to_string()).or_default();

        if !store.is_permitted(tenant, requester) {
            return Status::unauthorized(format!("{} may not delete from {}", requester, tenant));
        }

        let record_id = &message.descriptor.record_id;
        let Some(existing) = store.records.get(record_id) else {
            return Status::not_found("record not found");
        };
        if existing.message.descriptor.message_timestamp >= message.descriptor.message_timestamp {
            return Status::conflict("delete is older than the latest write");
        }

        store.records.remove(record_id);
        store.tombstones.insert(record_id.clone());
        debug!(tenant, record_id = %record_id, "Deleted record");
        Status::accepted()
    }

    fn handle_configure(
        &self,
        tenant: &str,
        requester: &str,
        message: ProtocolsConfigureMessage,
    ) -> Status {
        let Ok(mut tenants) = self.tenants.write() else {
            return Status::new(500, "store lock poisoned");
        };
        let store = tenants.entry(tenant.to_string()).or_default();

        if !store.is_permitted(tenant, requester) {
            return Status::unauthorized(format!(
                "{} may not configure protocols of {}",
                requester, tenant
            ));
        }

        let uri = message.descriptor.definition.protocol.clone();
        if let Some(existing) = store.protocols.get(&uri) {
            if existing.descriptor.message_timestamp >= message.descriptor.message_timestamp {
                return Status::conflict("a newer configuration of the protocol exists");
            }
        }

        debug!(tenant, protocol = %uri, "Configured protocol");
        store.protocols.insert(uri, message);
        Status::accepted()
    }

    fn handle_protocols_query(
        &self,
        tenant: &str,
        requester: &str,
        message: ProtocolsQueryMessage,
    ) -> Reply {
        let Ok(tenants) = self.tenants.read() else {
            return Reply::status(Status::new(500, "store lock poisoned"));
        };
        let Some(store) = tenants.get(tenant) else {
            return Reply::status(Status::ok());
        };

        let owner = store.is_permitted(tenant, requester);
        let wanted = message.descriptor.filter.and_then(|f| f.protocol);
        let mut protocols: Vec<ProtocolsConfigureMessage> = store
            .protocols
            .values()
            .filter(|p| owner || p.descriptor.definition.published)
            .filter(|p| {
                wanted
                    .as_deref()
                    .map_or(true, |w| p.descriptor.definition.protocol == w)
            })
            .cloned()
            .collect();
        protocols.sort_by(|a, b| {
            a.descriptor
                .message_timestamp
                .cmp(&b.descriptor.message_timestamp)
        });

        Reply {
            protocols,
            ..Reply::status(Status::ok())
        }
    }
}

#[async_trait]
impl MessageNode for MemoryNode {
    async fn process_message(&self, tenant: &str, message: Message, data: Option<Bytes>) -> Reply {
        let kind = message.kind();
        let requester = match self.authenticate(&message).await {
            Ok(author) => author,
            Err(status) => {
                warn!(tenant, kind, detail = %status.detail, "Rejected message");
                return Reply::status(status);
            }
        };

        let reply = match message {
            Message::RecordsWrite(m) => Reply::status(self.handle_write(tenant, requester, m, data)),
            Message::RecordsRead(m) => self.handle_read(tenant, &requester, m),
            Message::RecordsQuery(m) => self.handle_query(tenant, &requester, m),
            Message::RecordsDelete(m) => Reply::status(self.handle_delete(tenant, &requester, m)),
            Message::ProtocolsConfigure(m) => {
                Reply::status(self.handle_configure(tenant, &requester, m))
            }
            Message::ProtocolsQuery(m) => self.handle_protocols_query(tenant, &requester, m),
        };

        debug!(tenant, kind, code = reply.status.code, "Processed message");
        reply
    }
}
