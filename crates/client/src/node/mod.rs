//! Node-side message processing seam.
//!
//! A node accepts a signed message (plus its payload, for writes) on behalf
//! of a tenant DID and answers with a status-coded [`Reply`]. The agent's own
//! store and every remote endpoint sit behind this trait.

mod memory;

pub use memory::MemoryNode;

use async_trait::async_trait;
use bytes::Bytes;
use dwn_protocol::{Message, Reply};

/// Something that processes DWN messages.
#[async_trait]
pub trait MessageNode: Send + Sync {
    /// Processes `message` against `tenant`'s store.
    ///
    /// `data` carries the full payload of a records write; other messages
    /// pass `None`.
    async fn process_message(&self, tenant: &str, message: Message, data: Option<Bytes>) -> Reply;
}
