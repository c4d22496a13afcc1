//! Ed25519 DID identities.
//!
//! A [`DidIdentity`] owns a keypair and the `did:key`-style identifier derived
//! from its public key. It signs on behalf of that DID and can publish a
//! matching [`DidDocument`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{
    Signature as Ed25519Signature, Signer as _, SigningKey, Verifier, VerifyingKey,
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use ::cid::multibase::{self, Base};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::did::{DidDocument, VerificationMethod, ED25519_KEY_TYPE};
use crate::error::{ProtocolError, Result};
use crate::jws::Signer;

/// Multicodec for an Ed25519 public key.
pub const ED25519_PUB_CODEC: u64 = 0xed;

/// `ED25519_PUB_CODEC` as its unsigned varint.
const ED25519_PUB_PREFIX: [u8; 2] = [0xed, 0x01];

/// Key id fragment used for the single signing key of a [`DidIdentity`].
pub const KEY_FRAGMENT: &str = "0";

/// JWS algorithm name for Ed25519.
pub const EDDSA_ALG: &str = "EdDSA";

/// A 64-byte Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] pub [u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Creates a new Signature from raw bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a signature from a byte slice of the right length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|_| {
            ProtocolError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw bytes of this signature.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    fn as_ed25519(&self) -> Ed25519Signature {
        Ed25519Signature::from_bytes(&self.0)
    }
}

/// Verifies an Ed25519 signature with a public key.
pub fn verify_ed25519(key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    key.verify(message, &signature.as_ed25519())
        .map_err(ProtocolError::from)
}

/// Derives the `did:key` identifier of an Ed25519 public key.
///
/// The method-specific id is the multicodec-prefixed key in multibase
/// base64url form.
pub fn did_for_public_key(key: &VerifyingKey) -> String {
    let mut bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + ED25519_PUB_PREFIX.len());
    bytes.extend_from_slice(&ED25519_PUB_PREFIX);
    bytes.extend_from_slice(key.as_bytes());
    format!("did:key:{}", multibase::encode(Base::Base64Url, bytes))
}

/// A DID together with the secret key that signs for it.
#[derive(Clone)]
pub struct DidIdentity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    did: String,
}

impl DidIdentity {
    /// Generates a new random identity.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Restores an identity from raw secret key bytes.
    pub fn from_secret_key_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let did = did_for_public_key(&verifying_key);
        Self {
            signing_key,
            verifying_key,
            did,
        }
    }

    /// Returns the secret key bytes.
    ///
    /// **Security Warning**: only use this for secure storage.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Returns the public key bytes.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    /// The DID this identity signs for.
    pub fn did(&self) -> &str {
        &self.did
    }

    /// Full id of the signing key, `<did>#0`.
    pub fn key_id(&self) -> String {
        format!("{}#{}", self.did, KEY_FRAGMENT)
    }

    /// Signs arbitrary bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Verifies a signature produced by this identity.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        verify_ed25519(&self.verifying_key, message, signature)
    }

    /// Builds the DID document for this identity.
    pub fn document(&self) -> DidDocument {
        let mut doc = DidDocument::new(self.did.clone());
        doc.verification_method.push(VerificationMethod {
            id: self.key_id(),
            key_type: ED25519_KEY_TYPE.to_string(),
            controller: self.did.clone(),
            public_key_base64url: URL_SAFE_NO_PAD.encode(self.verifying_key.as_bytes()),
        });
        doc
    }
}

impl Signer for DidIdentity {
    fn key_id(&self) -> String {
        DidIdentity::key_id(self)
    }

    fn algorithm(&self) -> &str {
        EDDSA_ALG
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(DidIdentity::sign(self, data).as_bytes().to_vec())
    }
}

impl std::fmt::Debug for DidIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DidIdentity")
            .field("did", &self.did)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Serde support for signatures (base64url string).
mod signature_serde {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use ed25519_dalek::SIGNATURE_LENGTH;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(sig: &[u8; SIGNATURE_LENGTH], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        URL_SAFE_NO_PAD.encode(sig).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; SIGNATURE_LENGTH], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: String = Deserialize::deserialize(deserializer)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(&encoded)
            .map_err(serde::de::Error::custom)?;
        bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "invalid signature length: expected {}, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            ))
        })
    }
}
