//! # DWN Client Library
//!
//! Records and Protocols client for Decentralized Web Nodes.
//!
//! ## Overview
//!
//! The client signs protocol messages on behalf of a connected DID and sends
//! them either to the agent's own store or to the node of a remote DID:
//!
//! - **Message Builder**: typed requests to signed messages
//! - **Dispatcher**: `Local | Remote(did)` routing and reply normalization
//! - **Records / Protocols**: request facades returning handles
//! - **Record**: `update`, `delete` and `send` on one logical record
//! - **Record Data**: inline payloads, or one lazy fetch above the threshold
//! - **Nodes and Transports**: in-memory node, HTTP and loopback transports
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  Dwn (connected DID)                          │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐   │
//! │  │   Records   │  │  Protocols  │  │   Record / Protocol  │   │
//! │  │   facade    │  │   facade    │  │   handles + data     │   │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘   │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │        Message Builder  (SigningContext)                │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │        Dispatcher  (DidResolver + Transport)            │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │  ┌──────────────────┐        ┌─────────────────────────────┐  │
//! │  │  local node      │        │  HTTP / loopback transport  │  │
//! │  └──────────────────┘        └─────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dwn_client::{ClientConfig, Dwn, MemoryKeyStore, MemoryNode, StaticResolver, WriteRequest};
//! use dwn_protocol::DidIdentity;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::load_default()?;
//!     dwn_client::logging::init(&config.client.log_level)?;
//!
//!     let identity = DidIdentity::generate();
//!     let resolver = Arc::new(StaticResolver::new());
//!     resolver.register(identity.document());
//!
//!     let did = identity.did().to_string();
//!     let keys = Arc::new(MemoryKeyStore::new());
//!     keys.insert(identity);
//!     let local = Arc::new(MemoryNode::new(resolver.clone(), config.client.inline_threshold));
//!
//!     let dwn = Dwn::with_http(&config, did, keys, local, resolver)?;
//!     let written = dwn
//!         .records()
//!         .write(WriteRequest::new("Hello, world!").schema("foo/bar"))
//!         .await?;
//!     println!("{}", written.status.code);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`builder`]: message construction and signing
//! - [`config`]: configuration loading and defaults
//! - [`dispatcher`]: target routing and status mapping
//! - [`error`]: error taxonomy
//! - [`keys`]: signing context
//! - [`logging`]: tracing bootstrap
//! - [`node`]: node seam and in-memory node
//! - [`protocols`]: protocols facade and handle
//! - [`records`]: records facade, handle and data
//! - [`resolver`]: DID resolution seam
//! - [`transport`]: JSON-RPC transports

pub mod builder;
pub mod config;
pub mod dispatcher;
mod dwn;
pub mod error;
pub mod keys;
pub mod logging;
pub mod node;
pub mod protocols;
pub mod records;
pub mod resolver;
pub mod transport;

pub use builder::{DataInput, MessageBuilder, RecordUpdate, SignedWrite, WriteFields};
pub use config::{ClientConfig, ConfigError};
pub use dispatcher::{Dispatcher, Target};
pub use dwn::Dwn;
pub use error::{Error, Result, TransportError};
pub use keys::{MemoryKeyStore, SigningContext};
pub use node::{MemoryNode, MessageNode};
pub use protocols::{
    ConfigureRequest, ConfigureResult, Protocol, Protocols, ProtocolsQueryRequest,
    ProtocolsQueryResult,
};
pub use records::{
    CreateFromRequest, DeleteRequest, DeleteResult, QueryRequest, QueryResult, ReadRequest,
    ReadResult, Record, RecordData, Records, WriteRequest, WriteResult,
};
pub use resolver::{DidResolver, StaticResolver};
pub use transport::{HttpTransport, LoopbackTransport, Transport};
