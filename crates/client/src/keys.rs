//! Signing context: which keys may sign as which DID.
//!
//! Key custody is an external concern; the client only asks for a
//! [`Signer`] per DID. [`MemoryKeyStore`] is the in-process implementation.

use std::sync::Arc;

use dashmap::DashMap;
use dwn_protocol::{DidIdentity, Signer};

use crate::error::{Error, Result};

/// Provides signers for the DIDs an agent controls.
///
/// Implementations must be thread-safe; the same context is shared read-only
/// by concurrent requests.
pub trait SigningContext: Send + Sync {
    /// Returns a signer for `did`, or [`Error::Authorization`] if no usable
    /// key is available.
    fn signer(&self, did: &str) -> Result<Arc<dyn Signer>>;
}

/// In-memory key store keyed by DID.
#[derive(Default)]
pub struct MemoryKeyStore {
    identities: DashMap<String, Arc<DidIdentity>>,
}

impl MemoryKeyStore {
    /// Creates an empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identity, replacing any previous key for the same DID.
    pub fn insert(&self, identity: DidIdentity) {
        tracing::debug!(did = %identity.did(), "Registered signing identity");
        self.identities
            .insert(identity.did().to_string(), Arc::new(identity));
    }

    /// Removes the key for a DID. Returns whether one was present.
    pub fn remove(&self, did: &str) -> bool {
        self.identities.remove(did).is_some()
    }

    /// Whether a key is held for `did`.
    pub fn contains(&self, did: &str) -> bool {
        self.identities.contains_key(did)
    }
}

impl SigningContext for MemoryKeyStore {
    fn signer(&self, did: &str) -> Result<Arc<dyn Signer>> {
        self.identities
            .get(did)
            .map(|entry| entry.value().clone() as Arc<dyn Signer>)
            .ok_or_else(|| Error::Authorization(format!("no signing key available for {}", did)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_for_known_did() {
        let store = MemoryKeyStore::new();
        let identity = DidIdentity::generate();
        let did = identity.did().to_string();
        store.insert(identity);

        let signer = store.signer(&did).unwrap();
        assert_eq!(signer.key_id(), format!("{}#0", did));
        assert_eq!(signer.sign(b"data").unwrap().len(), 64);
    }

    #[test]
    fn test_signer_for_unknown_did() {
        let store = MemoryKeyStore::new();
        let err = store.signer("did:example:nobody").err().unwrap();
        assert!(matches!(err, Error::Authorization(_)));
    }

    #[test]
    fn test_remove() {
        let store = MemoryKeyStore::new();
        let identity = DidIdentity::generate();
        let did = identity.did().to_string();
        store.insert(identity);

        assert!(store.contains(&did));
        assert!(store.remove(&did));
        assert!(!store.contains(&did));
        assert!(!store.remove(&did));
    }
}
