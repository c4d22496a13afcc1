//! DID resolution seam.
//!
//! Resolving a DID method is out of scope; the client consumes a
//! [`DidResolver`] that hands back documents. [`StaticResolver`] serves
//! documents registered up front.

use async_trait::async_trait;
use dashmap::DashMap;
use dwn_protocol::{Did, DidDocument};

use crate::error::TransportError;

/// Resolves DIDs to their documents.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolves `did`, failing with [`TransportError::Resolution`].
    async fn resolve(&self, did: &str) -> Result<DidDocument, TransportError>;
}

/// Resolver over a fixed set of documents.
#[derive(Default)]
pub struct StaticResolver {
    documents: DashMap<String, DidDocument>,
}

impl StaticResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a document.
    pub fn register(&self, document: DidDocument) {
        tracing::debug!(did = %document.id, "Registered DID document");
        self.documents.insert(document.id.clone(), document);
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument, TransportError> {
        Did::parse(did).map_err(|e| TransportError::Resolution {
            did: did.to_string(),
            reason: e.to_string(),
        })?;

        self.documents
            .get(did)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::Resolution {
                did: did.to_string(),
                reason: "DID document not found".to_string(),
            })
    }
}
