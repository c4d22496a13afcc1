//! Transports to remote nodes.
//!
//! Messages travel as JSON-RPC 2.0 `dwn.processMessage` calls. Records write
//! payloads ride along base64url-encoded in the request params.
//!
//! - [`HttpTransport`]: POSTs to the endpoint URL with reqwest
//! - [`LoopbackTransport`]: hands the request to an in-process [`MessageNode`]

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dwn_protocol::messages::{decode_data, encode_data};
use dwn_protocol::{Message, Reply};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::TransportSection;
use crate::error::TransportError;
use crate::node::MessageNode;

/// JSON-RPC method name for message processing.
pub const PROCESS_MESSAGE_METHOD: &str = "dwn.processMessage";

/// JSON-RPC protocol version.
const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: RpcParams,
}

/// Params of a `dwn.processMessage` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcParams {
    /// Tenant DID whose store processes the message.
    pub target: String,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_data: Option<String>,
}

impl RpcRequest {
    /// Builds a `dwn.processMessage` request with a fresh id.
    pub fn process_message(target: &str, message: Message, data: Option<&[u8]>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            method: PROCESS_MESSAGE_METHOD.to_string(),
            params: RpcParams {
                target: target.to_string(),
                message,
                encoded_data: data.map(encode_data),
            },
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Result of a successful `dwn.processMessage` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResult {
    pub reply: Reply,
}

/// A JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    /// A successful response carrying `reply`.
    pub fn success(id: String, reply: Reply) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(RpcResult { reply }),
            error: None,
        }
    }

    /// An error response.
    pub fn failure(id: String, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Extracts the node reply of the request with id `expected_id`.
    pub fn into_reply(self, expected_id: &str) -> Result<Reply, TransportError> {
        if self.id != expected_id {
            return Err(TransportError::Malformed(format!(
                "response id {} does not match request id {}",
                self.id, expected_id
            )));
        }
        if let Some(error) = self.error {
            return Err(TransportError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .map(|r| r.reply)
            .ok_or_else(|| TransportError::Malformed("response has neither result nor error".to_string()))
    }
}

/// Delivers requests to node endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` to `endpoint` and returns the raw response.
    async fn send(&self, endpoint: &str, request: RpcRequest) -> Result<RpcResponse, TransportError>;
}

/// HTTP transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport honouring the configured timeout and user agent.
    pub fn new(config: &TransportSection) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &str, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let url = Url::parse(endpoint)
            .map_err(|e| TransportError::UnknownEndpoint(format!("{}: {}", endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::UnknownEndpoint(format!(
                "{}: unsupported scheme {}",
                endpoint,
                url.scheme()
            )));
        }

        tracing::debug!(%url, id = %request.id, "Sending request");
        let response = self.client.post(url).json(&request).send().await?;
        let http_status = response.status();
        let body = response.bytes().await?;

        serde_json::from_slice(&body).map_err(|e| {
            TransportError::Malformed(format!("HTTP {} with unreadable body: {}", http_status, e))
        })
    }
}

/// In-process transport: endpoints map straight to nodes.
///
/// Requests still go through a JSON encode/decode cycle so that everything
/// crossing it is exactly what would cross the wire.
#[derive(Default)]
pub struct LoopbackTransport {
    nodes: DashMap<String, Arc<dyn MessageNode>>,
}

impl LoopbackTransport {
    /// Creates a transport with no endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `endpoint` with `node`.
    pub fn register(&self, endpoint: impl Into<String>, node: Arc<dyn MessageNode>) {
        self.nodes.insert(endpoint.into(), node);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, endpoint: &str, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let node = self
            .nodes
            .get(endpoint)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownEndpoint(endpoint.to_string()))?;

        let wire = serde_json::to_vec(&request)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let request: RpcRequest =
            serde_json::from_slice(&wire).map_err(|e| TransportError::Malformed(e.to_string()))?;

        if request.method != PROCESS_MESSAGE_METHOD {
            return Ok(RpcResponse::failure(
                request.id,
                -32601,
                format!("method not found: {}", request.method),
            ));
        }

        let data = match request.params.encoded_data.as_deref().map(decode_data) {
            Some(Ok(bytes)) => Some(Bytes::from(bytes)),
            Some(Err(e)) => return Ok(RpcResponse::failure(request.id, -32602, e.to_string())),
            None => None,
        };

        let reply = node
            .process_message(&request.params.target, request.params.message, data)
            .await;

        let response = RpcResponse::success(request.id, reply);
        let wire = serde_json::to_vec(&response)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        serde_json::from_slice(&wire).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwn_protocol::Status;

    struct StaticNode(u16);

    #[async_trait]
    impl MessageNode for StaticNode {
        async fn process_message(&self, _tenant: &str, _message: Message, _data: Option<Bytes>) -> Reply {
            Reply::status(Status::new(self.0, "static"))
        }
    }

    #[test]
    fn test_into_reply_checks_id() {
        let response = RpcResponse::success("a".to_string(), Reply::status(Status::ok()));
        assert!(matches!(
            response.into_reply("b"),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_into_reply_surfaces_rpc_error() {
        let response = RpcResponse::failure("a".to_string(), -32000, "node exploded");
        match response.into_reply("a") {
            Err(TransportError::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "node exploded");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_into_reply_requires_result() {
        let response = RpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: "a".to_string(),
            result: None,
            error: None,
        };
        assert!(matches!(
            response.into_reply("a"),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&TransportSection::default()).is_ok());
    }

    #[tokio::test]
    async fn test_http_rejects_non_http_endpoint() {
        let transport = HttpTransport::new(&TransportSection::default()).unwrap();
        let request = sample_request();
        let err = transport.send("ftp://dwn.example", request).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownEndpoint(_)));
    }

    #[tokio::test]
    async fn test_http_unreachable_endpoint() {
        let transport = HttpTransport::new(&TransportSection::default()).unwrap();
        let err = transport
            .send("http://127.0.0.1:9/", sample_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unreachable(_) | TransportError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_loopback_routes_by_endpoint() {
        let transport = LoopbackTransport::new();
        transport.register("mem://a", Arc::new(StaticNode(202)));

        let request = sample_request();
        let id = request.id.clone();
        let reply = transport
            .send("mem://a", request)
            .await
            .unwrap()
            .into_reply(&id)
            .unwrap();
        assert_eq!(reply.status.code, 202);
    }

    #[tokio::test]
    async fn test_loopback_unknown_endpoint() {
        let transport = LoopbackTransport::new();
        let err = transport.send("mem://nowhere", sample_request()).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownEndpoint(_)));
    }

    fn sample_request() -> RpcRequest {
        use dwn_protocol::messages::{
            timestamp, GenericMessage, Interface, Method, ProtocolsQueryDescriptor,
        };
        use dwn_protocol::{cid_of_json, Authorization, DidIdentity, GeneralJws};

        let identity = DidIdentity::generate();
        let descriptor = ProtocolsQueryDescriptor {
            interface: Interface::Protocols,
            method: Method::Query,
            message_timestamp: timestamp(),
            filter: None,
        };
        let payload = serde_json::json!({ "descriptorCid": cid_of_json(&descriptor).unwrap() });
        let message = Message::ProtocolsQuery(GenericMessage {
            descriptor,
            authorization: Authorization {
                signature: GeneralJws::sign(&payload, &[&identity]).unwrap(),
            },
        });
        RpcRequest::process_message(identity.did(), message, None)
    }
}
