//! Shared fixtures: two DIDs, each with an agent store and a remote node.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dwn_client::{
    ClientConfig, Dwn, LoopbackTransport, MemoryKeyStore, MemoryNode, MessageNode, StaticResolver,
};
use dwn_protocol::{DidIdentity, Message, Reply};

/// Inline threshold used by every client and node in the fixtures.
pub const THRESHOLD: usize = 64;

/// Counts the messages a node processes.
pub struct CountingNode {
    inner: MemoryNode,
    reads: AtomicUsize,
    total: AtomicUsize,
}

impl CountingNode {
    pub fn wrap(inner: MemoryNode) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        })
    }

    /// Records reads processed so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Messages of any kind processed so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn node(&self) -> &MemoryNode {
        &self.inner
    }
}

#[async_trait]
impl MessageNode for CountingNode {
    async fn process_message(&self, tenant: &str, message: Message, data: Option<Bytes>) -> Reply {
        self.total.fetch_add(1, Ordering::SeqCst);
        if matches!(message, Message::RecordsRead(_)) {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.process_message(tenant, message, data).await
    }
}

pub struct Harness {
    pub alice: Dwn,
    pub alice_did: String,
    pub alice_local: Arc<CountingNode>,
    pub alice_remote: Arc<CountingNode>,
    pub bob: Dwn,
    pub bob_did: String,
    pub bob_remote: Arc<CountingNode>,
    pub resolver: Arc<StaticResolver>,
    pub transport: Arc<LoopbackTransport>,
}

pub fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.client.inline_threshold = THRESHOLD;
    config
}

/// Alice and Bob, each with an agent store and a node at `mem://<name>`.
pub fn harness() -> Harness {
    let resolver = Arc::new(StaticResolver::new());
    let transport = Arc::new(LoopbackTransport::new());

    let alice = DidIdentity::generate();
    let bob = DidIdentity::generate();
    let alice_did = alice.did().to_string();
    let bob_did = bob.did().to_string();
    resolver.register(alice.document().with_dwn_endpoints(["mem://alice"]));
    resolver.register(bob.document().with_dwn_endpoints(["mem://bob"]));

    let alice_remote = CountingNode::wrap(MemoryNode::new(resolver.clone(), THRESHOLD));
    let bob_remote = CountingNode::wrap(MemoryNode::new(resolver.clone(), THRESHOLD));
    transport.register("mem://alice", alice_remote.clone());
    transport.register("mem://bob", bob_remote.clone());

    let alice_keys = Arc::new(MemoryKeyStore::new());
    alice_keys.insert(alice);
    let bob_keys = Arc::new(MemoryKeyStore::new());
    bob_keys.insert(bob);

    let alice_local = CountingNode::wrap(MemoryNode::new(resolver.clone(), THRESHOLD));
    let bob_local = CountingNode::wrap(MemoryNode::new(resolver.clone(), THRESHOLD));

    let config = config();
    let alice = Dwn::new(
        &config,
        alice_did.clone(),
        alice_keys,
        alice_local.clone(),
        resolver.clone(),
        transport.clone(),
    )
    .unwrap();
    let bob = Dwn::new(
        &config,
        bob_did.clone(),
        bob_keys,
        bob_local,
        resolver.clone(),
        transport.clone(),
    )
    .unwrap();

    Harness {
        alice,
        alice_did,
        alice_local,
        alice_remote,
        bob,
        bob_did,
        bob_remote,
        resolver,
        transport,
    }
}

/// A payload that does not fit under [`THRESHOLD`].
pub fn large_json() -> serde_json::Value {
    serde_json::json!({
        "subject": "quarterly report",
        "body": "x".repeat(THRESHOLD * 2),
    })
}
