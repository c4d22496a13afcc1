//! General JWS envelopes.
//!
//! Message authorization and attestation are both a JWS in general JSON
//! serialization: one base64url payload, one or more signatures each with its
//! own protected header naming the signing key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::{verify_ed25519, Signature, EDDSA_ALG};
use crate::did::{did_from_key_id, DidDocument};
use crate::error::{ProtocolError, Result};

/// Something that can sign on behalf of a DID key.
///
/// Implemented by [`crate::DidIdentity`]; external key managers (HSMs,
/// wallets) implement it to plug in their own keys.
pub trait Signer: Send + Sync {
    /// Full key id, `<did>#<fragment>`.
    fn key_id(&self) -> String;

    /// JWS algorithm name.
    fn algorithm(&self) -> &str;

    /// Signs the JWS signing input.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Protected header of a single signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    /// Signature algorithm.
    pub alg: String,
    /// Signing key id.
    pub kid: String,
}

/// One signature of a general JWS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// base64url JSON of the [`ProtectedHeader`].
    pub protected: String,
    /// base64url signature bytes.
    pub signature: String,
}

impl SignatureEntry {
    /// Decodes the protected header.
    pub fn header(&self) -> Result<ProtectedHeader> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.protected)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A JWS in general JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralJws {
    /// base64url JSON payload.
    pub payload: String,
    /// Signatures over the payload.
    pub signatures: Vec<SignatureEntry>,
}

impl GeneralJws {
    /// Serializes `payload` and signs it with every signer, in order.
    pub fn sign<T: Serialize + ?Sized>(payload: &T, signers: &[&dyn Signer]) -> Result<Self> {
        if signers.is_empty() {
            return Err(ProtocolError::InvalidSignature(
                "at least one signer is required".to_string(),
            ));
        }

        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let mut signatures = Vec::with_capacity(signers.len());
        for signer in signers {
            let header = ProtectedHeader {
                alg: signer.algorithm().to_string(),
                kid: signer.key_id(),
            };
            let protected = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
            let signature = signer.sign(signing_input(&protected, &payload).as_bytes())?;
            signatures.push(SignatureEntry {
                protected,
                signature: URL_SAFE_NO_PAD.encode(signature),
            });
        }

        Ok(Self {
            payload,
            signatures,
        })
    }

    /// Decodes the payload.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = URL_SAFE_NO_PAD.decode(&self.payload)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// DIDs of all signers, in signature order.
    pub fn signer_dids(&self) -> Result<Vec<String>> {
        self.signatures
            .iter()
            .map(|entry| did_from_key_id(&entry.header()?.kid))
            .collect()
    }

    /// Verifies the signature at `index` against the signer's DID document.
    pub fn verify_signature(&self, index: usize, document: &DidDocument) -> Result<()> {
        let entry = self.signatures.get(index).ok_or_else(|| {
            ProtocolError::InvalidSignature(format!("no signature at index {}", index))
        })?;
        let header = entry.header()?;
        if header.alg != EDDSA_ALG {
            return Err(ProtocolError::InvalidSignature(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }
        if did_from_key_id(&header.kid)? != document.id {
            return Err(ProtocolError::InvalidSignature(format!(
                "key {} does not belong to {}",
                header.kid, document.id
            )));
        }

        let method = document.verification_method(&header.kid).ok_or_else(|| {
            ProtocolError::InvalidPublicKey(format!("{} not found in DID document", header.kid))
        })?;
        let key = method.verifying_key()?;
        let signature = Signature::from_slice(&URL_SAFE_NO_PAD.decode(&entry.signature)?)?;

        verify_ed25519(
            &key,
            signing_input(&entry.protected, &self.payload).as_bytes(),
            &signature,
        )
    }
}

fn signing_input(protected: &str, payload: &str) -> String {
    format!("{}.{}", protected, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DidIdentity;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: String,
    }

    fn payload() -> Payload {
        Payload {
            value: "descriptor".to_string(),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let alice = DidIdentity::generate();
        let jws = GeneralJws::sign(&payload(), &[&alice]).unwrap();

        assert_eq!(jws.signatures.len(), 1);
        assert!(jws.verify_signature(0, &alice.document()).is_ok());
        assert_eq!(jws.decode_payload::<Payload>().unwrap(), payload());
    }

    #[test]
    fn test_signer_dids() {
        let alice = DidIdentity::generate();
        let bob = DidIdentity::generate();
        let jws = GeneralJws::sign(&payload(), &[&alice, &bob]).unwrap();

        assert_eq!(
            jws.signer_dids().unwrap(),
            vec![alice.did().to_string(), bob.did().to_string()]
        );
        assert!(jws.verify_signature(1, &bob.document()).is_ok());
    }

    #[test]
    fn test_verify_rejects_other_document() {
        let alice = DidIdentity::generate();
        let mallory = DidIdentity::generate();
        let jws = GeneralJws::sign(&payload(), &[&alice]).unwrap();

        assert!(jws.verify_signature(0, &mallory.document()).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let alice = DidIdentity::generate();
        let mut jws = GeneralJws::sign(&payload(), &[&alice]).unwrap();
        jws.payload = URL_SAFE_NO_PAD.encode(br#"{"value":"forged"}"#);

        assert!(matches!(
            jws.verify_signature(0, &alice.document()),
            Err(ProtocolError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_sign_requires_a_signer() {
        assert!(GeneralJws::sign(&payload(), &[]).is_err());
    }

    #[test]
    fn test_verify_missing_index() {
        let alice = DidIdentity::generate();
        let jws = GeneralJws::sign(&payload(), &[&alice]).unwrap();
        assert!(jws.verify_signature(3, &alice.document()).is_err());
    }
}
