//! Message routing.
//!
//! Every outgoing message goes either to the agent's own node or to the node
//! of a remote DID, found through the DID document's DWN service endpoint.
//! Replies are normalized before they reach the handles:
//!
//! | Node status | Outcome                                   |
//! |-------------|-------------------------------------------|
//! | 200, 202    | reply as received                         |
//! | other       | status only; any body is dropped          |
//!
//! Transport errors are reserved for failures that never produced a status:
//! resolution, unreachable or unknown endpoints, timeouts and malformed or
//! JSON-RPC error responses.

use std::sync::Arc;

use bytes::Bytes;
use dwn_protocol::{Message, Reply, Status};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::node::MessageNode;
use crate::resolver::DidResolver;
use crate::transport::{RpcRequest, Transport};

/// Where a message is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The agent's own node, on behalf of the connected DID.
    Local,
    /// The node of the given DID.
    Remote(String),
}

impl Target {
    /// `Remote(did)` when a DID is given, otherwise `Local`.
    pub fn from_option(from: Option<String>) -> Self {
        match from {
            Some(did) => Target::Remote(did),
            None => Target::Local,
        }
    }

    /// The DID whose store a message lands in.
    pub fn tenant<'a>(&'a self, local_tenant: &'a str) -> &'a str {
        match self {
            Target::Local => local_tenant,
            Target::Remote(did) => did,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Local => write!(f, "local"),
            Target::Remote(did) => write!(f, "{}", did),
        }
    }
}

/// Routes messages to the local node or to remote endpoints.
pub struct Dispatcher {
    local: Arc<dyn MessageNode>,
    resolver: Arc<dyn DidResolver>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new(
        local: Arc<dyn MessageNode>,
        resolver: Arc<dyn DidResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            local,
            resolver,
            transport,
        }
    }

    /// Sends `message` (with its payload, for writes) to `target`.
    ///
    /// `local_tenant` is the DID whose store the local node acts on.
    pub async fn dispatch(
        &self,
        target: &Target,
        local_tenant: &str,
        message: Message,
        data: Option<Bytes>,
    ) -> Result<Reply> {
        let kind = message.kind();
        let reply = match target {
            Target::Local => self.local.process_message(local_tenant, message, data).await,
            Target::Remote(did) => self.send_remote(did, message, data).await?,
        };

        debug!(to = %target, kind, code = reply.status.code, "Dispatched message");
        Ok(normalize(reply))
    }

    async fn send_remote(
        &self,
        did: &str,
        message: Message,
        data: Option<Bytes>,
    ) -> std::result::Result<Reply, TransportError> {
        let document = self.resolver.resolve(did).await?;
        let endpoint = document
            .dwn_endpoints()
            .first()
            .map(|e| e.to_string())
            .ok_or_else(|| TransportError::Resolution {
                did: did.to_string(),
                reason: "no DecentralizedWebNode service endpoint".to_string(),
            })?;

        let request = RpcRequest::process_message(did, message, data.as_deref());
        let id = request.id.clone();
        let response = self.transport.send(&endpoint, request).await.map_err(|e| {
            warn!(did, %endpoint, error = %e, "Remote dispatch failed");
            e
        })?;
        response.into_reply(&id)
    }
}

fn normalize(reply: Reply) -> Reply {
    match reply.status.code {
        Status::OK | Status::ACCEPTED => reply,
        _ => Reply::status(reply.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resolver::StaticResolver;
    use crate::transport::LoopbackTransport;
    use async_trait::async_trait;
    use dwn_protocol::messages::{
        timestamp, GenericMessage, Interface, Method, ProtocolsQueryDescriptor,
    };
    use dwn_protocol::{cid_of_json, Authorization, DidDocument, DidIdentity, GeneralJws};
    use std::sync::Mutex;

    /// Answers with a fixed reply and records the tenant it was asked for.
    struct FixedNode {
        reply: Reply,
        tenants: Mutex<Vec<String>>,
    }

    impl FixedNode {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                tenants: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageNode for FixedNode {
        async fn process_message(&self, tenant: &str, _message: Message, _data: Option<Bytes>) -> Reply {
            self.tenants.lock().unwrap().push(tenant.to_string());
            self.reply.clone()
        }
    }

    fn query_message() -> Message {
        let identity = DidIdentity::generate();
        let descriptor = ProtocolsQueryDescriptor {
            interface: Interface::Protocols,
            method: Method::Query,
            message_timestamp: timestamp(),
            filter: None,
        };
        let payload = serde_json::json!({ "descriptorCid": cid_of_json(&descriptor).unwrap() });
        Message::ProtocolsQuery(GenericMessage {
            descriptor,
            authorization: Authorization {
                signature: GeneralJws::sign(&payload, &[&identity]).unwrap(),
            },
        })
    }

    fn dispatcher(local: Arc<FixedNode>, remote: Arc<FixedNode>) -> Dispatcher {
        let resolver = Arc::new(StaticResolver::new());
        resolver.register(DidDocument::new("did:example:bob").with_dwn_endpoints(["mem://bob"]));
        resolver.register(DidDocument::new("did:example:carol"));

        let transport = Arc::new(LoopbackTransport::new());
        transport.register("mem://bob", remote);

        Dispatcher::new(local, resolver, transport)
    }

    #[test]
    fn test_target_from_option() {
        assert_eq!(Target::from_option(None), Target::Local);
        assert_eq!(
            Target::from_option(Some("did:example:bob".to_string())),
            Target::Remote("did:example:bob".to_string())
        );
        assert_eq!(Target::Local.tenant("did:example:alice"), "did:example:alice");
        assert_eq!(
            Target::Remote("did:example:bob".to_string()).tenant("did:example:alice"),
            "did:example:bob"
        );
    }

    #[tokio::test]
    async fn test_local_dispatch_uses_local_tenant() {
        let local = FixedNode::new(Reply::status(Status::accepted()));
        let remote = FixedNode::new(Reply::status(Status::ok()));
        let d = dispatcher(local.clone(), remote.clone());

        let reply = d
            .dispatch(&Target::Local, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 202);
        assert_eq!(*local.tenants.lock().unwrap(), vec!["did:example:alice"]);
        assert!(remote.tenants.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_dispatch_targets_remote_tenant() {
        let local = FixedNode::new(Reply::status(Status::accepted()));
        let remote = FixedNode::new(Reply::status(Status::ok()));
        let d = dispatcher(local.clone(), remote.clone());

        let target = Target::Remote("did:example:bob".to_string());
        let reply = d
            .dispatch(&target, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 200);
        assert_eq!(*remote.tenants.lock().unwrap(), vec!["did:example:bob"]);
        assert!(local.tenants.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_reply_drops_body() {
        let mut reply = Reply::status(Status::unauthorized("nope"));
        reply.cursor = Some("ucursor".to_string());
        let remote = FixedNode::new(reply);
        let d = dispatcher(FixedNode::new(Reply::status(Status::ok())), remote);

        let target = Target::Remote("did:example:bob".to_string());
        let reply = d
            .dispatch(&target, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 401);
        assert!(reply.cursor.is_none());
        assert!(reply.protocols.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_keeps_status_only() {
        let mut reply = Reply::status(Status::not_found("gone"));
        reply.cursor = Some("ucursor".to_string());
        let local = FixedNode::new(reply);
        let d = dispatcher(local, FixedNode::new(Reply::status(Status::ok())));

        let reply = d
            .dispatch(&Target::Local, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 404);
        assert_eq!(reply.status.detail, "gone");
        assert!(reply.cursor.is_none());
    }

    #[tokio::test]
    async fn test_conflict_is_a_status_not_an_error() {
        let mut reply = Reply::status(Status::conflict("stale"));
        reply.cursor = Some("ucursor".to_string());
        let local = FixedNode::new(reply);
        let d = dispatcher(local, FixedNode::new(Reply::status(Status::ok())));

        let reply = d
            .dispatch(&Target::Local, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 409);
        assert_eq!(reply.status.detail, "stale");
        assert!(reply.cursor.is_none());
    }

    #[tokio::test]
    async fn test_remote_server_error_is_a_status() {
        let remote = FixedNode::new(Reply::status(Status::new(500, "disk full")));
        let d = dispatcher(FixedNode::new(Reply::status(Status::ok())), remote);

        let target = Target::Remote("did:example:bob".to_string());
        let reply = d
            .dispatch(&target, "did:example:alice", query_message(), None)
            .await
            .unwrap();
        assert_eq!(reply.status.code, 500);
    }

    #[tokio::test]
    async fn test_unresolvable_target() {
        let d = dispatcher(
            FixedNode::new(Reply::status(Status::ok())),
            FixedNode::new(Reply::status(Status::ok())),
        );

        let target = Target::Remote("did:example:nobody".to_string());
        let err = d
            .dispatch(&target, "did:example:alice", query_message(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Resolution { .. })));
    }

    #[tokio::test]
    async fn test_target_without_dwn_service() {
        let d = dispatcher(
            FixedNode::new(Reply::status(Status::ok())),
            FixedNode::new(Reply::status(Status::ok())),
        );

        let target = Target::Remote("did:example:carol".to_string());
        let err = d
            .dispatch(&target, "did:example:alice", query_message(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Resolution { .. })));
    }
}
