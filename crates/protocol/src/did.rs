//! Decentralized identifiers and DID documents.
//!
//! Only the parts of a DID document this layer consumes are modelled:
//! Ed25519 verification methods (to check message signatures) and
//! `DecentralizedWebNode` services (to find where a DID's node lives).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{VerifyingKey, PUBLIC_KEY_LENGTH};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Service type under which a DID advertises its node endpoints.
pub const DWN_SERVICE_TYPE: &str = "DecentralizedWebNode";

/// Verification method type for Ed25519 keys.
pub const ED25519_KEY_TYPE: &str = "Ed25519VerificationKey2020";

/// A parsed `did:<method>:<id>` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did {
    /// The DID method, e.g. `key`.
    pub method: String,
    /// The method-specific identifier.
    pub id: String,
}

impl Did {
    /// Parses a DID, rejecting empty or malformed identifiers.
    ///
    /// A DID URL fragment (`#key-0`) is not accepted here; use
    /// [`did_from_key_id`] to strip it first.
    pub fn parse(did: &str) -> Result<Self> {
        let rest = did
            .strip_prefix("did:")
            .ok_or_else(|| ProtocolError::InvalidDid(format!("'{}' does not start with did:", did)))?;
        let (method, id) = rest
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidDid(format!("'{}' has no method-specific id", did)))?;

        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ProtocolError::InvalidDid(format!(
                "'{}' has an invalid method name",
                did
            )));
        }
        if id.is_empty() || id.contains('#') || id.contains(char::is_whitespace) {
            return Err(ProtocolError::InvalidDid(format!(
                "'{}' has an invalid method-specific id",
                did
            )));
        }

        Ok(Self {
            method: method.to_string(),
            id: id.to_string(),
        })
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)
    }
}

/// Returns the DID part of a key id such as `did:key:abc#0`.
pub fn did_from_key_id(kid: &str) -> Result<String> {
    let did = kid.split('#').next().unwrap_or_default();
    Did::parse(did)?;
    Ok(did.to_string())
}

/// A verification method entry of a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Full key id, `<did>#<fragment>`.
    pub id: String,
    /// Key type.
    #[serde(rename = "type")]
    pub key_type: String,
    /// The controlling DID.
    pub controller: String,
    /// Raw public key bytes, base64url.
    pub public_key_base64url: String,
}

impl VerificationMethod {
    /// Decodes the Ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.public_key_base64url)?;
        let arr: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            ProtocolError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&arr).map_err(|e| ProtocolError::InvalidPublicKey(e.to_string()))
    }
}

/// A service entry of a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service id, `<did>#<fragment>`.
    pub id: String,
    /// Service type.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Endpoint URLs, in order of preference.
    pub service_endpoint: Vec<String>,
}

/// The subset of a DID document used by this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The DID this document describes.
    pub id: String,
    /// Keys authorized to sign as this DID.
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    /// Advertised services.
    #[serde(default)]
    pub service: Vec<Service>,
}

impl DidDocument {
    /// Creates an empty document for a DID.
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            id: did.into(),
            verification_method: Vec::new(),
            service: Vec::new(),
        }
    }

    /// Adds a `DecentralizedWebNode` service with the given endpoints.
    pub fn with_dwn_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service.push(Service {
            id: format!("{}#dwn", self.id),
            service_type: DWN_SERVICE_TYPE.to_string(),
            service_endpoint: endpoints.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Looks up a verification method by full key id.
    pub fn verification_method(&self, kid: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|vm| vm.id == kid)
    }

    /// All endpoints of `DecentralizedWebNode` services, in document order.
    pub fn dwn_endpoints(&self) -> Vec<&str> {
        self.service
            .iter()
            .filter(|s| s.service_type == DWN_SERVICE_TYPE)
            .flat_map(|s| s.service_endpoint.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_did() {
        let did = Did::parse("did:example:alice").unwrap();
        assert_eq!(did.method, "example");
        assert_eq!(did.id, "alice");
        assert_eq!(did.to_string(), "did:example:alice");
    }

    #[test]
    fn test_parse_keeps_colons_in_id() {
        let did = Did::parse("did:web:example.com:users:alice").unwrap();
        assert_eq!(did.method, "web");
        assert_eq!(did.id, "example.com:users:alice");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "did:", "did:key", "did::abc", "did:KEY:abc", "alice", "did:key:a#0"] {
            assert!(
                matches!(Did::parse(bad), Err(ProtocolError::InvalidDid(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_did_from_key_id() {
        assert_eq!(
            did_from_key_id("did:example:alice#key-1").unwrap(),
            "did:example:alice"
        );
        assert!(did_from_key_id("#key-1").is_err());
    }

    #[test]
    fn test_dwn_endpoints_filters_service_type() {
        let mut doc = DidDocument::new("did:example:alice")
            .with_dwn_endpoints(["https://dwn.example.com", "https://backup.example.com"]);
        doc.service.push(Service {
            id: "did:example:alice#hub".to_string(),
            service_type: "LinkedDomains".to_string(),
            service_endpoint: vec!["https://alice.example".to_string()],
        });

        assert_eq!(
            doc.dwn_endpoints(),
            vec!["https://dwn.example.com", "https://backup.example.com"]
        );
    }

    #[test]
    fn test_document_json_shape() {
        let doc = DidDocument::new("did:example:alice").with_dwn_endpoints(["https://dwn"]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["service"][0]["type"], DWN_SERVICE_TYPE);
        assert_eq!(json["service"][0]["serviceEndpoint"][0], "https://dwn");
    }

    #[test]
    fn test_bad_public_key_length() {
        let vm = VerificationMethod {
            id: "did:example:alice#0".to_string(),
            key_type: ED25519_KEY_TYPE.to_string(),
            controller: "did:example:alice".to_string(),
            public_key_base64url: URL_SAFE_NO_PAD.encode([1u8; 16]),
        };
        assert!(matches!(
            vm.verifying_key(),
            Err(ProtocolError::InvalidPublicKey(_))
        ));
    }
}
