//! Entry point wiring signing, building and dispatch together.

use std::sync::Arc;

use crate::builder::MessageBuilder;
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::keys::SigningContext;
use crate::node::MessageNode;
use crate::protocols::Protocols;
use crate::records::Records;
use crate::resolver::DidResolver;
use crate::transport::{HttpTransport, Transport};

/// State shared by the facades and every handle they return.
pub(crate) struct ClientContext {
    pub(crate) connected_did: String,
    pub(crate) builder: MessageBuilder,
    pub(crate) dispatcher: Dispatcher,
}

/// A client acting as one connected DID.
///
/// The client keeps no state beyond its signing context and dispatcher;
/// everything else lives in the [`Record`](crate::Record) and
/// [`Protocol`](crate::Protocol) handles it returns.
pub struct Dwn {
    ctx: Arc<ClientContext>,
}

impl Dwn {
    /// Creates a client for `connected_did`.
    ///
    /// `local` is the agent's own store; remote DIDs are resolved through
    /// `resolver` and reached over `transport`.
    pub fn new(
        config: &ClientConfig,
        connected_did: impl Into<String>,
        keys: Arc<dyn SigningContext>,
        local: Arc<dyn MessageNode>,
        resolver: Arc<dyn DidResolver>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;
        let connected_did = connected_did.into();
        dwn_protocol::Did::parse(&connected_did)
            .map_err(|e| Error::Validation(format!("connected DID: {}", e)))?;

        tracing::info!(did = %connected_did, "DWN client ready");
        Ok(Self {
            ctx: Arc::new(ClientContext {
                builder: MessageBuilder::new(keys, config.client.inline_threshold),
                dispatcher: Dispatcher::new(local, resolver, transport),
                connected_did,
            }),
        })
    }

    /// Creates a client that reaches remote nodes over HTTP.
    pub fn with_http(
        config: &ClientConfig,
        connected_did: impl Into<String>,
        keys: Arc<dyn SigningContext>,
        local: Arc<dyn MessageNode>,
        resolver: Arc<dyn DidResolver>,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.transport)?);
        Self::new(config, connected_did, keys, local, resolver, transport)
    }

    /// The DID this client acts as.
    pub fn connected_did(&self) -> &str {
        &self.ctx.connected_did
    }

    /// Records operations.
    pub fn records(&self) -> Records<'_> {
        Records::new(&self.ctx)
    }

    /// Protocols operations.
    pub fn protocols(&self) -> Protocols<'_> {
        Protocols::new(&self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::MemoryKeyStore;
    use crate::node::MemoryNode;
    use crate::resolver::StaticResolver;
    use crate::transport::LoopbackTransport;

    fn parts() -> (Arc<MemoryKeyStore>, Arc<MemoryNode>, Arc<StaticResolver>) {
        let resolver = Arc::new(StaticResolver::new());
        let node = Arc::new(MemoryNode::new(resolver.clone(), 1024));
        (Arc::new(MemoryKeyStore::new()), node, resolver)
    }

    #[test]
    fn test_rejects_malformed_connected_did() {
        let (keys, node, resolver) = parts();
        let result = Dwn::new(
            &ClientConfig::default(),
            "alice",
            keys,
            node,
            resolver,
            Arc::new(LoopbackTransport::new()),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let (keys, node, resolver) = parts();
        let mut config = ClientConfig::default();
        config.client.inline_threshold = 0;
        let result = Dwn::new(
            &config,
            "did:example:alice",
            keys,
            node,
            resolver,
            Arc::new(LoopbackTransport::new()),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_with_http() {
        let (keys, node, resolver) = parts();
        let dwn = Dwn::with_http(
            &ClientConfig::default(),
            "did:example:alice",
            keys,
            node,
            resolver,
        )
        .unwrap();
        assert_eq!(dwn.connected_did(), "did:example:alice");
    }
}
