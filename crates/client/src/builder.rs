//! Message construction and signing.
//!
//! The builder turns typed requests into signed protocol messages. It stamps
//! the fields the client owns (timestamps, data CID and size, record
//! identity) and copies caller-supplied descriptor fields through untouched.
//! Nothing here performs I/O; signing goes through the [`SigningContext`].

use std::sync::Arc;

use bytes::Bytes;
use dwn_protocol::messages::{
    encode_data, entry_id, timestamp, timestamp_after, AttestationPayload, AuthorizationPayload,
    DateSort, EncryptionProperty, GenericMessage, Interface, Method, Pagination,
    ProtocolsConfigureDescriptor, ProtocolsConfigureMessage, ProtocolsFilter,
    ProtocolsQueryDescriptor, ProtocolsQueryMessage, RecordsDeleteDescriptor,
    RecordsDeleteMessage, RecordsQueryDescriptor, RecordsQueryMessage, RecordsReadDescriptor,
    RecordsReadMessage, RecordsWriteDescriptor,
};
use dwn_protocol::{
    cid_of_json, compute_cid, Authorization, Did, GeneralJws, ProtocolDefinition, RecordsFilter,
    RecordsWriteMessage, Signer,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::keys::SigningContext;

/// Validation message for structured data that has no canonical byte form.
const UNPARSEABLE_DATA: &str = "data not parseable into a JSON object";

/// A record payload as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DataInput {
    /// Raw bytes, `application/octet-stream` unless told otherwise.
    Bytes(Bytes),
    /// UTF-8 text, `text/plain` unless told otherwise.
    Text(String),
    /// A structured value, stored as JCS canonical JSON (`application/json`).
    Json(Value),
}

impl DataInput {
    /// Converts any serializable value into a structured payload.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(DataInput::Json)
            .map_err(|e| Error::Validation(format!("{}: {}", UNPARSEABLE_DATA, e)))
    }

    /// The data format used when the caller does not name one.
    pub fn default_format(&self) -> &'static str {
        match self {
            DataInput::Bytes(_) => "application/octet-stream",
            DataInput::Text(_) => "text/plain",
            DataInput::Json(_) => "application/json",
        }
    }

    /// Canonical bytes of the payload.
    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            DataInput::Bytes(bytes) => Ok(bytes),
            DataInput::Text(text) => Ok(Bytes::from(text)),
            DataInput::Json(value) => serde_jcs::to_vec(&value)
                .map(Bytes::from)
                .map_err(|e| Error::Validation(format!("{}: {}", UNPARSEABLE_DATA, e))),
        }
    }
}

impl From<&str> for DataInput {
    fn from(text: &str) -> Self {
        DataInput::Text(text.to_string())
    }
}

impl From<String> for DataInput {
    fn from(text: String) -> Self {
        DataInput::Text(text)
    }
}

impl From<Vec<u8>> for DataInput {
    fn from(bytes: Vec<u8>) -> Self {
        DataInput::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for DataInput {
    fn from(bytes: &[u8]) -> Self {
        DataInput::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for DataInput {
    fn from(bytes: Bytes) -> Self {
        DataInput::Bytes(bytes)
    }
}

impl From<Value> for DataInput {
    fn from(value: Value) -> Self {
        DataInput::Json(value)
    }
}

/// Caller-supplied descriptor fields of a new record.
#[derive(Debug, Clone, Default)]
pub struct WriteFields {
    pub protocol: Option<String>,
    pub protocol_path: Option<String>,
    pub schema: Option<String>,
    /// Defaults to the payload's natural format.
    pub data_format: Option<String>,
    pub recipient: Option<String>,
    pub parent_id: Option<String>,
    /// Context of the parent, required for protocol records with a parent.
    pub parent_context_id: Option<String>,
    pub published: Option<bool>,
    /// Defaults to the creation time for published records.
    pub date_published: Option<String>,
    pub encryption: Option<EncryptionProperty>,
    /// DIDs that countersign the descriptor.
    pub attesters: Vec<String>,
}

/// Changes requested by `Record::update`.
///
/// Only `data`, `published` and `date_published` may be set; the remaining
/// fields exist so that attempts to change them are rejected by name.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub data: Option<DataInput>,
    pub published: Option<bool>,
    /// Only valid together with `published: Some(true)` on a record that is
    /// not yet published; defaults to the update's timestamp.
    pub date_published: Option<String>,
    pub schema: Option<String>,
    pub protocol: Option<String>,
    pub protocol_path: Option<String>,
    pub data_format: Option<String>,
    pub recipient: Option<String>,
    pub parent_id: Option<String>,
}

impl RecordUpdate {
    /// An update replacing the payload.
    pub fn data(data: impl Into<DataInput>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// An update changing the published flag.
    pub fn published(published: bool) -> Self {
        Self {
            published: Some(published),
            ..Default::default()
        }
    }

    /// Fails with [`Error::ImmutableProperty`] naming the first immutable
    /// field present.
    pub fn check_immutable(&self) -> Result<()> {
        let touched = [
            ("schema", self.schema.is_some()),
            ("protocol", self.protocol.is_some()),
            ("protocolPath", self.protocol_path.is_some()),
            ("dataFormat", self.data_format.is_some()),
            ("recipient", self.recipient.is_some()),
            ("parentId", self.parent_id.is_some()),
        ];
        match touched.iter().find(|(_, present)| *present) {
            Some(&(property, _)) => Err(Error::ImmutableProperty { property }),
            None => Ok(()),
        }
    }
}

/// A signed records write and its payload.
///
/// `message.encoded_data` is set only when the payload is at or below the
/// inline threshold; `data` always holds the full payload for transfer.
#[derive(Debug, Clone)]
pub struct SignedWrite {
    pub message: RecordsWriteMessage,
    pub data: Bytes,
}

impl SignedWrite {
    /// Whether the payload travels inside the message.
    pub fn is_inline(&self) -> bool {
        self.message.encoded_data.is_some()
    }
}

/// Builds and signs messages for the DIDs in a signing context.
pub struct MessageBuilder {
    keys: Arc<dyn SigningContext>,
    inline_threshold: usize,
}

impl MessageBuilder {
    /// Creates a builder. Payloads larger than `inline_threshold` bytes are
    /// kept out of the message.
    pub fn new(keys: Arc<dyn SigningContext>, inline_threshold: usize) -> Self {
        Self {
            keys,
            inline_threshold,
        }
    }

    /// The inline threshold in bytes.
    pub fn inline_threshold(&self) -> usize {
        self.inline_threshold
    }

    /// Builds the initial write of a new record authored by `author`.
    pub fn records_write(&self, author: &str, fields: WriteFields, data: DataInput) -> Result<SignedWrite> {
        require_did("author", author)?;
        if let Some(recipient) = &fields.recipient {
            require_did("recipient", recipient)?;
        }

        let data_format = fields
            .data_format
            .unwrap_or_else(|| data.default_format().to_string());
        let data = data.into_bytes()?;

        let now = timestamp();
        let published = fields.published;
        let date_published = match published {
            Some(true) => Some(fields.date_published.unwrap_or_else(|| now.clone())),
            _ => None,
        };

        let descriptor = RecordsWriteDescriptor {
            interface: Interface::Records,
            method: Method::Write,
            protocol: fields.protocol,
            protocol_path: fields.protocol_path,
            recipient: fields.recipient,
            schema: fields.schema,
            parent_id: fields.parent_id,
            data_cid: compute_cid(&data),
            data_size: data.len() as u64,
            date_created: now.clone(),
            message_timestamp: now,
            published,
            date_published,
            data_format,
        };

        let record_id = entry_id(&descriptor, author)?;
        let context_id = match (&descriptor.protocol, &descriptor.parent_id) {
            (None, _) => None,
            (Some(_), None) => Some(record_id.clone()),
            (Some(_), Some(_)) => Some(fields.parent_context_id.ok_or_else(|| {
                Error::Validation(
                    "protocol records with a parent need the parent's contextId".to_string(),
                )
            })?),
        };

        self.sign_write(
            author,
            record_id,
            context_id,
            descriptor,
            fields.encryption,
            &fields.attesters,
            data,
        )
    }

    /// Builds the next write of an existing record.
    ///
    /// Identity, creation date and immutable fields are carried over from
    /// `current`. The write is signed by the record's author. When the update
    /// carries no data the payload is unchanged and `None` is returned in
    /// place of bytes; the node keeps the stored copy.
    pub fn records_update(
        &self,
        current: &RecordsWriteMessage,
        update: RecordUpdate,
    ) -> Result<(RecordsWriteMessage, Option<Bytes>)> {
        update.check_immutable()?;
        let author = current.authorization.author()?;

        let mut descriptor = current.descriptor.clone();
        descriptor.message_timestamp = timestamp_after(&current.descriptor.message_timestamp);

        let data = match update.data {
            Some(input) => {
                let bytes = input.into_bytes()?;
                descriptor.data_cid = compute_cid(&bytes);
                descriptor.data_size = bytes.len() as u64;
                Some(bytes)
            }
            None => None,
        };

        match (descriptor.is_published(), update.published) {
            (true, Some(false)) => {
                return Err(Error::Validation(
                    "a published record cannot be unpublished".to_string(),
                ))
            }
            (false, Some(true)) => {
                descriptor.published = Some(true);
                descriptor.date_published = Some(
                    update
                        .date_published
                        .unwrap_or_else(|| descriptor.message_timestamp.clone()),
                );
            }
            _ if update.date_published.is_some() => {
                return Err(Error::Validation(
                    "datePublished can only be set when the record becomes published".to_string(),
                ))
            }
            _ => {}
        }

        // Encryption metadata describes the old ciphertext once data changes.
        let encryption = if data.is_some() {
            None
        } else {
            current.encryption.clone()
        };

        let signed = self.sign_write(
            &author,
            current.record_id.clone(),
            current.context_id.clone(),
            descriptor,
            encryption,
            &[],
            data.clone().unwrap_or_default(),
        )?;
        let mut message = signed.message;
        if data.is_none() {
            message.encoded_data = None;
        }
        Ok((message, data))
    }

    #[allow(clippy::too_many_arguments)]
    fn sign_write(
        &self,
        author: &str,
        record_id: String,
        context_id: Option<String>,
        descriptor: RecordsWriteDescriptor,
        encryption: Option<EncryptionProperty>,
        attesters: &[String],
        data: Bytes,
    ) -> Result<SignedWrite> {
        let descriptor_cid = cid_of_json(&descriptor)?;

        let attestation = if attesters.is_empty() {
            None
        } else {
            let signers = attesters
                .iter()
                .map(|did| self.keys.signer(did))
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&dyn Signer> = signers.iter().map(|s| s.as_ref()).collect();
            let payload = AttestationPayload {
                descriptor_cid: descriptor_cid.clone(),
            };
            Some(GeneralJws::sign(&payload, &refs)?)
        };

        let payload = AuthorizationPayload {
            descriptor_cid,
            record_id: Some(record_id.clone()),
            context_id: context_id.clone(),
            attestation_cid: attestation.as_ref().map(cid_of_json).transpose()?,
            encryption_cid: encryption.as_ref().map(cid_of_json).transpose()?,
        };
        let authorization = self.authorize(author, &payload)?;

        let encoded_data = (data.len() <= self.inline_threshold).then(|| encode_data(&data));
        tracing::debug!(
            record_id = %record_id,
            size = data.len(),
            inline = encoded_data.is_some(),
            "Built records write"
        );

        Ok(SignedWrite {
            message: RecordsWriteMessage {
                record_id,
                context_id,
                descriptor,
                authorization,
                encryption,
                attestation,
                encoded_data,
            },
            data,
        })
    }

    /// Builds a records read.
    pub fn records_read(&self, author: &str, filter: RecordsFilter) -> Result<RecordsReadMessage> {
        self.generic(
            author,
            RecordsReadDescriptor {
                interface: Interface::Records,
                method: Method::Read,
                message_timestamp: timestamp(),
                filter,
            },
        )
    }

    /// Builds a records query.
    pub fn records_query(
        &self,
        author: &str,
        filter: RecordsFilter,
        date_sort: Option<DateSort>,
        pagination: Option<Pagination>,
    ) -> Result<RecordsQueryMessage> {
        self.generic(
            author,
            RecordsQueryDescriptor {
                interface: Interface::Records,
                method: Method::Query,
                message_timestamp: timestamp(),
                filter,
                date_sort,
                pagination,
            },
        )
    }

    /// Builds a records delete.
    pub fn records_delete(&self, author: &str, record_id: &str) -> Result<RecordsDeleteMessage> {
        if record_id.is_empty() {
            return Err(Error::Validation("recordId must not be empty".to_string()));
        }
        self.generic(
            author,
            RecordsDeleteDescriptor {
                interface: Interface::Records,
                method: Method::Delete,
                message_timestamp: timestamp(),
                record_id: record_id.to_string(),
            },
        )
    }

    /// Builds a protocols configure.
    pub fn protocols_configure(
        &self,
        author: &str,
        definition: ProtocolDefinition,
    ) -> Result<ProtocolsConfigureMessage> {
        if definition.protocol.trim().is_empty() {
            return Err(Error::Validation(
                "protocol definition needs a protocol URI".to_string(),
            ));
        }
        self.generic(
            author,
            ProtocolsConfigureDescriptor {
                interface: Interface::Protocols,
                method: Method::Configure,
                message_timestamp: timestamp(),
                definition,
            },
        )
    }

    /// Builds a protocols query.
    pub fn protocols_query(
        &self,
        author: &str,
        filter: Option<ProtocolsFilter>,
    ) -> Result<ProtocolsQueryMessage> {
        self.generic(
            author,
            ProtocolsQueryDescriptor {
                interface: Interface::Protocols,
                method: Method::Query,
                message_timestamp: timestamp(),
                filter,
            },
        )
    }

    fn generic<D: Serialize>(&self, author: &str, descriptor: D) -> Result<GenericMessage<D>> {
        require_did("author", author)?;
        let payload = AuthorizationPayload {
            descriptor_cid: cid_of_json(&descriptor)?,
            record_id: None,
            context_id: None,
            attestation_cid: None,
            encryption_cid: None,
        };
        Ok(GenericMessage {
            authorization: self.authorize(author, &payload)?,
            descriptor,
        })
    }

    fn authorize(&self, author: &str, payload: &AuthorizationPayload) -> Result<Authorization> {
        let signer = self.keys.signer(author)?;
        Ok(Authorization {
            signature: GeneralJws::sign(payload, &[signer.as_ref()])?,
        })
    }
}

fn require_did(field: &str, did: &str) -> Result<()> {
    if did.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Did::parse(did)
        .map(|_| ())
        .map_err(|e| Error::Validation(format!("{}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MemoryKeyStore;
    use dwn_protocol::messages::{decode_data, KeyEncryption};
    use dwn_protocol::DidIdentity;
    use std::collections::BTreeMap;

    fn builder(threshold: usize) -> (MessageBuilder, String, Arc<MemoryKeyStore>) {
        let keys = Arc::new(MemoryKeyStore::new());
        let identity = DidIdentity::generate();
        let did = identity.did().to_string();
        keys.insert(identity);
        (MessageBuilder::new(keys.clone(), threshold), did, keys)
    }

    fn schema_fields() -> WriteFields {
        WriteFields {
            schema: Some("foo/bar".to_string()),
            data_format: Some("text/plain".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_stamps_data_and_identity() {
        let (builder, did, _) = builder(1024);
        let signed = builder
            .records_write(&did, schema_fields(), "Hello, world!".into())
            .unwrap();

        let d = &signed.message.descriptor;
        assert_eq!(d.data_cid, compute_cid(b"Hello, world!"));
        assert_eq!(d.data_size, 13);
        assert_eq!(d.date_created, d.message_timestamp);
        assert_eq!(d.schema.as_deref(), Some("foo/bar"));
        assert_eq!(signed.message.record_id, entry_id(d, &did).unwrap());
        assert!(signed.message.context_id.is_none());
        assert_eq!(signed.message.authorization.author().unwrap(), did);

        let payload = signed.message.authorization.payload().unwrap();
        assert_eq!(payload.descriptor_cid, cid_of_json(d).unwrap());
        assert_eq!(payload.record_id.as_deref(), Some(signed.message.record_id.as_str()));
    }

    #[test]
    fn test_payload_inline_at_threshold() {
        let (builder, did, _) = builder(13);
        let signed = builder
            .records_write(&did, schema_fields(), "Hello, world!".into())
            .unwrap();
        assert!(signed.is_inline());
        let inline = decode_data(signed.message.encoded_data.as_deref().unwrap()).unwrap();
        assert_eq!(inline, b"Hello, world!");
    }

    #[test]
    fn test_payload_detached_above_threshold() {
        let (builder, did, _) = builder(12);
        let signed = builder
            .records_write(&did, schema_fields(), "Hello, world!".into())
            .unwrap();
        assert!(!signed.is_inline());
        assert_eq!(&signed.data[..], b"Hello, world!");
    }

    #[test]
    fn test_default_data_formats() {
        let (builder, did, _) = builder(1024);
        let text = builder
            .records_write(&did, WriteFields::default(), "hi".into())
            .unwrap();
        assert_eq!(text.message.descriptor.data_format, "text/plain");

        let json = builder
            .records_write(&did, WriteFields::default(), serde_json::json!({"a": 1}).into())
            .unwrap();
        assert_eq!(json.message.descriptor.data_format, "application/json");

        let bytes = builder
            .records_write(&did, WriteFields::default(), vec![0u8, 1, 2].into())
            .unwrap();
        assert_eq!(bytes.message.descriptor.data_format, "application/octet-stream");
    }

    #[test]
    fn test_structured_data_is_canonical() {
        let (builder, did, _) = builder(1024);
        let a = builder
            .records_write(&did, WriteFields::default(), serde_json::json!({"b": 2, "a": 1}).into())
            .unwrap();
        assert_eq!(&a.data[..], br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_unserializable_data_is_validation_error() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "non-string key");
        let err = DataInput::from_serialize(&map).unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("data not parseable into a JSON object")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_author_is_validation_error() {
        let (builder, _, _) = builder(1024);
        let err = builder
            .records_write("", WriteFields::default(), "x".into())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = builder.records_read("not-a-did", RecordsFilter::default()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unknown_signer_is_authorization_error() {
        let (builder, _, _) = builder(1024);
        let err = builder
            .records_write("did:example:stranger", WriteFields::default(), "x".into())
            .unwrap_err();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[test]
    fn test_protocol_root_and_child_context() {
        let (builder, did, _) = builder(1024);
        let root = builder
            .records_write(
                &did,
                WriteFields {
                    protocol: Some("http://email-protocol.xyz".to_string()),
                    protocol_path: Some("email".to_string()),
                    ..Default::default()
                },
                "root".into(),
            )
            .unwrap();
        assert_eq!(root.message.context_id.as_deref(), Some(root.message.record_id.as_str()));

        let child = builder
            .records_write(
                &did,
                WriteFields {
                    protocol: Some("http://email-protocol.xyz".to_string()),
                    protocol_path: Some("email/reply".to_string()),
                    parent_id: Some(root.message.record_id.clone()),
                    parent_context_id: root.message.context_id.clone(),
                    ..Default::default()
                },
                "child".into(),
            )
            .unwrap();
        assert_eq!(child.message.context_id, root.message.context_id);

        let orphan = builder.records_write(
            &did,
            WriteFields {
                protocol: Some("http://email-protocol.xyz".to_string()),
                parent_id: Some(root.message.record_id.clone()),
                ..Default::default()
            },
            "orphan".into(),
        );
        assert!(matches!(orphan, Err(Error::Validation(_))));
    }

    #[test]
    fn test_attestation_and_encryption_are_bound() {
        let (builder, did, keys) = builder(1024);
        let attester = DidIdentity::generate();
        let attester_did = attester.did().to_string();
        keys.insert(attester);

        let encryption = EncryptionProperty {
            algorithm: "A256CTR".to_string(),
            initialization_vector: "aXY".to_string(),
            key_encryption: vec![KeyEncryption {
                root_key_id: format!("{}#enc", did),
                derivation_scheme: "protocolPath".to_string(),
                algorithm: "ECIES-ES256K".to_string(),
                encrypted_key: "a2V5".to_string(),
            }],
        };
        let signed = builder
            .records_write(
                &did,
                WriteFields {
                    encryption: Some(encryption.clone()),
                    attesters: vec![attester_did.clone()],
                    ..Default::default()
                },
                "secret".into(),
            )
            .unwrap();

        let attestation = signed.message.attestation.as_ref().unwrap();
        assert_eq!(attestation.signer_dids().unwrap(), vec![attester_did]);
        let attested: AttestationPayload = attestation.decode_payload().unwrap();
        assert_eq!(attested.descriptor_cid, cid_of_json(&signed.message.descriptor).unwrap());

        let payload = signed.message.authorization.payload().unwrap();
        assert_eq!(payload.attestation_cid, Some(cid_of_json(attestation).unwrap()));
        assert_eq!(payload.encryption_cid, Some(cid_of_json(&encryption).unwrap()));
    }

    #[test]
    fn test_update_keeps_identity() {
        let (builder, did, _) = builder(1024);
        let initial = builder
            .records_write(&did, schema_fields(), "v1".into())
            .unwrap()
            .message;

        let (next, data) = builder
            .records_update(&initial, RecordUpdate::data("v2"))
            .unwrap();
        assert_eq!(next.record_id, initial.record_id);
        assert_eq!(next.context_id, initial.context_id);
        assert_eq!(next.descriptor.date_created, initial.descriptor.date_created);
        assert!(next.descriptor.message_timestamp > initial.descriptor.message_timestamp);
        assert_eq!(next.descriptor.data_cid, compute_cid(b"v2"));
        assert_eq!(data.as_deref(), Some(&b"v2"[..]));
    }

    #[test]
    fn test_update_without_data_keeps_payload() {
        let (builder, did, _) = builder(1024);
        let initial = builder
            .records_write(&did, schema_fields(), "v1".into())
            .unwrap()
            .message;

        let (next, data) = builder
            .records_update(&initial, RecordUpdate::published(true))
            .unwrap();
        assert!(data.is_none());
        assert!(next.encoded_data.is_none());
        assert_eq!(next.descriptor.data_cid, initial.descriptor.data_cid);
        assert_eq!(next.descriptor.published, Some(true));
        assert_eq!(
            next.descriptor.date_published.as_deref(),
            Some(next.descriptor.message_timestamp.as_str())
        );
    }

    #[test]
    fn test_update_rejects_immutable_fields() {
        let (builder, did, _) = builder(1024);
        let initial = builder
            .records_write(&did, schema_fields(), "v1".into())
            .unwrap()
            .message;

        let update = RecordUpdate {
            data_format: Some("application/json".to_string()),
            ..Default::default()
        };
        let err = builder.records_update(&initial, update).unwrap_err();
        assert!(matches!(err, Error::ImmutableProperty { property: "dataFormat" }));

        let update = RecordUpdate {
            schema: Some("foo/bar".to_string()),
            ..Default::default()
        };
        let err = builder.records_update(&initial, update).unwrap_err();
        assert!(matches!(err, Error::ImmutableProperty { property: "schema" }));
    }

    #[test]
    fn test_update_cannot_unpublish() {
        let (builder, did, _) = builder(1024);
        let initial = builder
            .records_write(
                &did,
                WriteFields {
                    published: Some(true),
                    ..Default::default()
                },
                "public".into(),
            )
            .unwrap()
            .message;

        let err = builder
            .records_update(&initial, RecordUpdate::published(false))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_update_publishes_with_given_date() {
        let (builder, did, _) = builder(1024);
        let initial = builder
            .records_write(&did, WriteFields::default(), "draft".into())
            .unwrap()
            .message;

        let (message, _) = builder
            .records_update(
                &initial,
                RecordUpdate {
                    published: Some(true),
                    date_published: Some("2026-01-01T00:00:00.000000Z".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(message.descriptor.is_published());
        assert_eq!(
            message.descriptor.date_published.as_deref(),
            Some("2026-01-01T00:00:00.000000Z")
        );
    }

    #[test]
    fn test_update_rejects_stray_date_published() {
        let (builder, did, _) = builder(1024);
        let draft = builder
            .records_write(&did, WriteFields::default(), "draft".into())
            .unwrap()
            .message;
        let public = builder
            .records_write(
                &did,
                WriteFields {
                    published: Some(true),
                    ..Default::default()
                },
                "public".into(),
            )
            .unwrap()
            .message;

        let date_only = RecordUpdate {
            date_published: Some("2026-01-01T00:00:00.000000Z".to_string()),
            ..Default::default()
        };
        let err = builder.records_update(&draft, date_only.clone()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let republish = RecordUpdate {
            published: Some(true),
            ..date_only
        };
        let err = builder.records_update(&public, republish).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_delete_needs_record_id() {
        let (builder, did, _) = builder(1024);
        assert!(matches!(
            builder.records_delete(&did, ""),
            Err(Error::Validation(_))
        ));
        assert!(builder.records_delete(&did, "urecord").is_ok());
    }

    #[test]
    fn test_configure_needs_protocol_uri() {
        let (builder, did, _) = builder(1024);
        let definition = ProtocolDefinition {
            protocol: " ".to_string(),
            published: false,
            types: Value::Null,
            structure: Value::Null,
        };
        assert!(matches!(
            builder.protocols_configure(&did, definition),
            Err(Error::Validation(_))
        ));
    }
}
