//! # DWN Protocol Library
//!
//! Message definitions and primitives for talking to Decentralized Web Nodes.
//!
//! ## Overview
//!
//! This crate is the wire layer shared by clients and nodes:
//!
//! - **Message Definitions**: Records and Protocols descriptors, messages and replies
//! - **Content Identifiers**: CIDv1 over sha2-256 for payloads and descriptors
//! - **DID Identity**: Ed25519 keys, `did:key` identifiers, DID documents
//! - **Authorization**: general JWS envelopes binding a descriptor to its author
//! - **Error Types**: a single [`ProtocolError`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Message (descriptor + recordId)     │  camelCase JSON
//! ├─────────────────────────────────────────┤
//! │       Authorization (general JWS)       │  EdDSA over descriptor CID
//! ├─────────────────────────────────────────┤
//! │      Data (inline ≤ threshold / CID)    │  base64url / out of band
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use dwn_protocol::{compute_cid, DidIdentity, GeneralJws};
//! use dwn_protocol::messages::AttestationPayload;
//!
//! let identity = DidIdentity::generate();
//! let payload = AttestationPayload { descriptor_cid: compute_cid(b"descriptor") };
//! let jws = GeneralJws::sign(&payload, &[&identity]).unwrap();
//! assert!(jws.verify_signature(0, &identity.document()).is_ok());
//! ```

pub mod cid;
pub mod crypto;
pub mod did;
pub mod error;
pub mod jws;
pub mod messages;

pub use cid::{cid_of_json, compute_cid, parse_cid};
pub use crypto::{DidIdentity, Signature};
pub use did::{Did, DidDocument, Service, VerificationMethod, DWN_SERVICE_TYPE};
pub use error::{ProtocolError, Result};
pub use jws::{GeneralJws, Signer};
pub use messages::{
    Authorization, Message, ProtocolDefinition, RecordsFilter, RecordsWriteMessage, Reply,
    Status, DEFAULT_INLINE_THRESHOLD,
};
