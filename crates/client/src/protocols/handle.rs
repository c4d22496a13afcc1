use std::sync::Arc;

use dwn_protocol::messages::ProtocolsConfigureMessage;
use dwn_protocol::{Message, ProtocolDefinition, Status};

use crate::dispatcher::Target;
use crate::dwn::ClientContext;
use crate::error::Result;

/// A configured protocol.
///
/// Protocols cannot be updated or deleted through the client; a handle can
/// only be inspected and replicated.
pub struct Protocol {
    ctx: Arc<ClientContext>,
    message: ProtocolsConfigureMessage,
}

impl Protocol {
    pub(crate) fn new(ctx: Arc<ClientContext>, message: ProtocolsConfigureMessage) -> Self {
        Self { ctx, message }
    }

    /// The definition as configured.
    pub fn definition(&self) -> &ProtocolDefinition {
        &self.message.descriptor.definition
    }

    /// The protocol URI.
    pub fn uri(&self) -> &str {
        &self.message.descriptor.definition.protocol
    }

    /// Timestamp of the configuration.
    pub fn date_created(&self) -> &str {
        &self.message.descriptor.message_timestamp
    }

    /// The signed configure message.
    pub fn message(&self) -> &ProtocolsConfigureMessage {
        &self.message
    }

    /// Installs the same configuration at `target_did`'s node.
    pub async fn send(&self, target_did: &str) -> Result<Status> {
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &Target::Remote(target_did.to_string()),
                &self.ctx.connected_did,
                Message::ProtocolsConfigure(self.message.clone()),
                None,
            )
            .await?;
        tracing::debug!(protocol = %self.uri(), to = target_did, code = reply.status.code, "Sent protocol");
        Ok(reply.status)
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("uri", &self.uri())
            .field("published", &self.definition().published)
            .field("date_created", &self.date_created())
            .finish()
    }
}
