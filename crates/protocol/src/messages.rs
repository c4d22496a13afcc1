//! Protocol message definitions for Decentralized Web Nodes.
//!
//! Every message is a `descriptor` (what to do) plus an `authorization`
//! envelope (who asks). Records writes additionally carry identity
//! (`recordId`, `contextId`) and optional encryption/attestation envelopes.
//! All messages travel as camelCase JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cid::cid_of_json;
use crate::did::did_from_key_id;
use crate::error::{ProtocolError, Result};
use crate::jws::GeneralJws;

/// Payloads at or below this many bytes travel inline with their message.
pub const DEFAULT_INLINE_THRESHOLD: usize = 30_000;

/// Message interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    /// Records interface.
    Records,
    /// Protocols interface.
    Protocols,
}

/// Message method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Create or update a record.
    Write,
    /// Read one record.
    Read,
    /// Filter records or protocols.
    Query,
    /// Delete a record.
    Delete,
    /// Install a protocol definition.
    Configure,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Current time as a microsecond-precision RFC 3339 UTC timestamp.
///
/// The fixed width makes lexicographic order equal chronological order.
pub fn timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A timestamp strictly later than `previous`, normally the current time.
pub fn timestamp_after(previous: &str) -> String {
    let now = Utc::now();
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) if prev.with_timezone(&Utc) >= now => {
            format_timestamp(prev.with_timezone(&Utc) + Duration::microseconds(1))
        }
        _ => format_timestamp(now),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Data encoding
// ============================================================================

/// Encodes payload bytes for inline transport.
pub fn encode_data(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes an inline payload.
pub fn decode_data(encoded: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(encoded)?)
}

// ============================================================================
// Authorization, encryption, attestation
// ============================================================================

/// Signed authorization envelope of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Author signature over an [`AuthorizationPayload`].
    pub signature: GeneralJws,
}

impl Authorization {
    /// The DID that signed the message.
    pub fn author(&self) -> Result<String> {
        let entry = self.signature.signatures.first().ok_or_else(|| {
            ProtocolError::InvalidMessage("authorization carries no signature".to_string())
        })?;
        did_from_key_id(&entry.header()?.kid)
    }

    /// Decodes the signed payload.
    pub fn payload(&self) -> Result<AuthorizationPayload> {
        self.signature.decode_payload()
    }
}

/// Payload bound by an author signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    /// CID of the message descriptor.
    pub descriptor_cid: String,
    /// Record id, for records writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Context id, for protocol records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// CID of the attestation envelope, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_cid: Option<String>,
    /// CID of the encryption metadata, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_cid: Option<String>,
}

/// Payload bound by attestation signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationPayload {
    /// CID of the attested descriptor.
    pub descriptor_cid: String,
}

/// Key-encryption metadata of an encrypted record. Carried, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionProperty {
    /// Content encryption algorithm.
    pub algorithm: String,
    /// base64url initialization vector.
    pub initialization_vector: String,
    /// One entry per key the content key is wrapped with.
    pub key_encryption: Vec<KeyEncryption>,
}

/// A wrapped content key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEncryption {
    /// Id of the root key the derivation starts from.
    pub root_key_id: String,
    /// Derivation scheme, e.g. `protocolPath`.
    pub derivation_scheme: String,
    /// Key wrapping algorithm.
    pub algorithm: String,
    /// base64url wrapped key.
    pub encrypted_key: String,
}

// ============================================================================
// Records descriptors
// ============================================================================

/// Descriptor of a records write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteDescriptor {
    pub interface: Interface,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub data_cid: String,
    pub data_size: u64,
    pub date_created: String,
    pub message_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    pub data_format: String,
}

impl RecordsWriteDescriptor {
    /// Whether the record is publicly readable.
    pub fn is_published(&self) -> bool {
        self.published.unwrap_or(false)
    }
}

/// Filter over records.
///
/// Every present field must match; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl RecordsFilter {
    /// Filter matching a single record id.
    pub fn by_record_id(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            ..Default::default()
        }
    }

    /// Whether a stored write matches this filter.
    pub fn matches(&self, record_id: &str, author: &str, d: &RecordsWriteDescriptor, context_id: Option<&str>) -> bool {
        fn eq(want: &Option<String>, have: Option<&str>) -> bool {
            want.as_deref().map_or(true, |w| have == Some(w))
        }

        eq(&self.record_id, Some(record_id))
            && eq(&self.author, Some(author))
            && eq(&self.recipient, d.recipient.as_deref())
            && eq(&self.protocol, d.protocol.as_deref())
            && eq(&self.protocol_path, d.protocol_path.as_deref())
            && eq(&self.context_id, context_id)
            && eq(&self.schema, d.schema.as_deref())
            && eq(&self.parent_id, d.parent_id.as_deref())
            && eq(&self.data_format, Some(d.data_format.as_str()))
            && self.published.map_or(true, |p| p == d.is_published())
    }
}

/// Sort order of query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateSort {
    #[default]
    CreatedAscending,
    CreatedDescending,
    PublishedAscending,
    PublishedDescending,
}

/// Page window of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Maximum number of entries to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Record id after which to resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Descriptor of a records read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsReadDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub filter: RecordsFilter,
}

/// Descriptor of a records query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub filter: RecordsFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_sort: Option<DateSort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Descriptor of a records delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsDeleteDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub record_id: String,
}

// ============================================================================
// Protocols descriptors
// ============================================================================

/// A protocol definition. `types` and `structure` are opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolDefinition {
    /// Protocol URI.
    pub protocol: String,
    /// Whether non-owners may discover the definition.
    #[serde(default)]
    pub published: bool,
    /// Record types of the protocol.
    #[serde(default)]
    pub types: Value,
    /// Allowed nesting of record types.
    #[serde(default)]
    pub structure: Value,
}

/// Descriptor of a protocols configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsConfigureDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub definition: ProtocolDefinition,
}

/// Filter over configured protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Descriptor of a protocols query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ProtocolsFilter>,
}

// ============================================================================
// Messages
// ============================================================================

/// A records write: the only message that carries record identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteMessage {
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub descriptor: RecordsWriteDescriptor,
    pub authorization: Authorization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<GeneralJws>,
    /// Inline payload, only on query replies for small records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_data: Option<String>,
}

impl RecordsWriteMessage {
    /// Same message without any inline payload.
    pub fn without_data(&self) -> Self {
        Self {
            encoded_data: None,
            ..self.clone()
        }
    }
}

/// Any message that is a descriptor plus authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessage<D> {
    pub descriptor: D,
    pub authorization: Authorization,
}

pub type RecordsReadMessage = GenericMessage<RecordsReadDescriptor>;
pub type RecordsQueryMessage = GenericMessage<RecordsQueryDescriptor>;
pub type RecordsDeleteMessage = GenericMessage<RecordsDeleteDescriptor>;
pub type ProtocolsConfigureMessage = GenericMessage<ProtocolsConfigureDescriptor>;
pub type ProtocolsQueryMessage = GenericMessage<ProtocolsQueryDescriptor>;

/// Top-level message enum containing all message types.
///
/// Serialized without a wrapper; the variant is recovered from
/// `descriptor.interface` and `descriptor.method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Message {
    RecordsWrite(RecordsWriteMessage),
    RecordsRead(RecordsReadMessage),
    RecordsQuery(RecordsQueryMessage),
    RecordsDelete(RecordsDeleteMessage),
    ProtocolsConfigure(ProtocolsConfigureMessage),
    ProtocolsQuery(ProtocolsQueryMessage),
}

impl Message {
    /// Parses a message from its JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let descriptor = value
            .get("descriptor")
            .ok_or_else(|| ProtocolError::InvalidMessage("missing descriptor".to_string()))?;
        let field = |name: &str| {
            descriptor
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::InvalidMessage(format!("missing descriptor.{}", name)))
        };
        let interface = field("interface")?;
        let method = field("method")?;

        let message = match (interface.as_str(), method.as_str()) {
            ("Records", "Write") => Message::RecordsWrite(serde_json::from_value(value)?),
            ("Records", "Read") => Message::RecordsRead(serde_json::from_value(value)?),
            ("Records", "Query") => Message::RecordsQuery(serde_json::from_value(value)?),
            ("Records", "Delete") => Message::RecordsDelete(serde_json::from_value(value)?),
            ("Protocols", "Configure") => {
                Message::ProtocolsConfigure(serde_json::from_value(value)?)
            }
            ("Protocols", "Query") => Message::ProtocolsQuery(serde_json::from_value(value)?),
            (i, m) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "unknown message type {}{}",
                    i, m
                )))
            }
        };
        Ok(message)
    }

    /// Message type name, e.g. `RecordsWrite`.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RecordsWrite(_) => "RecordsWrite",
            Message::RecordsRead(_) => "RecordsRead",
            Message::RecordsQuery(_) => "RecordsQuery",
            Message::RecordsDelete(_) => "RecordsDelete",
            Message::ProtocolsConfigure(_) => "ProtocolsConfigure",
            Message::ProtocolsQuery(_) => "ProtocolsQuery",
        }
    }

    /// The authorization envelope.
    pub fn authorization(&self) -> &Authorization {
        match self {
            Message::RecordsWrite(m) => &m.authorization,
            Message::RecordsRead(m) => &m.authorization,
            Message::RecordsQuery(m) => &m.authorization,
            Message::RecordsDelete(m) => &m.authorization,
            Message::ProtocolsConfigure(m) => &m.authorization,
            Message::ProtocolsQuery(m) => &m.authorization,
        }
    }

    /// CID of the descriptor, as bound by the author signature.
    pub fn descriptor_cid(&self) -> Result<String> {
        match self {
            Message::RecordsWrite(m) => cid_of_json(&m.descriptor),
            Message::RecordsRead(m) => cid_of_json(&m.descriptor),
            Message::RecordsQuery(m) => cid_of_json(&m.descriptor),
            Message::RecordsDelete(m) => cid_of_json(&m.descriptor),
            Message::ProtocolsConfigure(m) => cid_of_json(&m.descriptor),
            Message::ProtocolsQuery(m) => cid_of_json(&m.descriptor),
        }
    }

    /// The descriptor's message timestamp.
    pub fn message_timestamp(&self) -> &str {
        match self {
            Message::RecordsWrite(m) => &m.descriptor.message_timestamp,
            Message::RecordsRead(m) => &m.descriptor.message_timestamp,
            Message::RecordsQuery(m) => &m.descriptor.message_timestamp,
            Message::RecordsDelete(m) => &m.descriptor.message_timestamp,
            Message::ProtocolsConfigure(m) => &m.descriptor.message_timestamp,
            Message::ProtocolsQuery(m) => &m.descriptor.message_timestamp,
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Message::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Record id of an initial write: the CID of its descriptor CID and author.
pub fn entry_id(descriptor: &RecordsWriteDescriptor, author: &str) -> Result<String> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct EntryIdInput<'a> {
        descriptor_cid: String,
        author: &'a str,
    }

    cid_of_json(&EntryIdInput {
        descriptor_cid: cid_of_json(descriptor)?,
        author,
    })
}

// ============================================================================
// Replies
// ============================================================================

/// Status of a processed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// HTTP-style status code.
    pub code: u16,
    /// Human-readable detail.
    pub detail: String,
}

impl Status {
    pub const OK: u16 = 200;
    pub const ACCEPTED: u16 = 202;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;

    /// Creates a status.
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Self::OK, "OK")
    }

    pub fn accepted() -> Self {
        Self::new(Self::ACCEPTED, "Accepted")
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(Self::UNAUTHORIZED, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(Self::BAD_REQUEST, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(Self::CONFLICT, detail)
    }

    /// Whether the code is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// A records read result: the latest write plus its full payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEntry {
    /// The latest write of the record.
    pub records_write: RecordsWriteMessage,
    /// base64url payload.
    pub data: String,
}

/// Reply of a node to any message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub status: Status,
    /// Records query results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<RecordsWriteMessage>,
    /// Records read result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ReadEntry>,
    /// Protocols query results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<ProtocolsConfigureMessage>,
    /// Record id to resume a truncated query from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl Reply {
    /// A reply carrying only a status.
    pub fn status(status: Status) -> Self {
        Self {
            status,
            entries: Vec::new(),
            record: None,
            protocols: Vec::new(),
            cursor: None,
        }
    }
}
