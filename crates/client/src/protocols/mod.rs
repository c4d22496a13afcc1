//! Protocols facade.

mod handle;

pub use handle::Protocol;

use std::sync::Arc;

use dwn_protocol::messages::ProtocolsFilter;
use dwn_protocol::{Message, ProtocolDefinition, Status};

use crate::dispatcher::Target;
use crate::dwn::ClientContext;
use crate::error::Result;

/// A protocols configure request.
#[derive(Debug, Clone)]
pub struct ConfigureRequest {
    pub definition: ProtocolDefinition,
}

impl ConfigureRequest {
    pub fn new(definition: ProtocolDefinition) -> Self {
        Self { definition }
    }
}

/// A protocols query request.
#[derive(Debug, Clone, Default)]
pub struct ProtocolsQueryRequest {
    /// Remote DID to query; the local store when absent.
    pub from: Option<String>,
    pub filter: Option<ProtocolsFilter>,
}

impl ProtocolsQueryRequest {
    /// Query for one protocol URI.
    pub fn protocol(uri: impl Into<String>) -> Self {
        Self {
            from: None,
            filter: Some(ProtocolsFilter {
                protocol: Some(uri.into()),
            }),
        }
    }

    pub fn from(mut self, did: impl Into<String>) -> Self {
        self.from = Some(did.into());
        self
    }
}

/// Outcome of a configure.
#[derive(Debug)]
pub struct ConfigureResult {
    pub status: Status,
    pub protocol: Option<Protocol>,
}

/// Outcome of a protocols query.
#[derive(Debug)]
pub struct ProtocolsQueryResult {
    pub status: Status,
    pub protocols: Vec<Protocol>,
}

/// Protocols operations for the connected DID.
pub struct Protocols<'a> {
    ctx: &'a Arc<ClientContext>,
}

impl<'a> Protocols<'a> {
    pub(crate) fn new(ctx: &'a Arc<ClientContext>) -> Self {
        Self { ctx }
    }

    /// Installs a protocol definition in the local store.
    pub async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResult> {
        let message = self
            .ctx
            .builder
            .protocols_configure(&self.ctx.connected_did, request.definition)?;
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &Target::Local,
                &self.ctx.connected_did,
                Message::ProtocolsConfigure(message.clone()),
                None,
            )
            .await?;

        let protocol = (reply.status.code == Status::ACCEPTED)
            .then(|| Protocol::new(self.ctx.clone(), message));
        Ok(ConfigureResult {
            status: reply.status,
            protocol,
        })
    }

    /// Lists configured protocols, locally or at `request.from`.
    pub async fn query(&self, request: ProtocolsQueryRequest) -> Result<ProtocolsQueryResult> {
        let origin = Target::from_option(request.from);
        let message = self
            .ctx
            .builder
            .protocols_query(&self.ctx.connected_did, request.filter)?;
        let reply = self
            .ctx
            .dispatcher
            .dispatch(
                &origin,
                &self.ctx.connected_did,
                Message::ProtocolsQuery(message),
                None,
            )
            .await?;

        let protocols = reply
            .protocols
            .into_iter()
            .map(|m| Protocol::new(self.ctx.clone(), m))
            .collect();
        Ok(ProtocolsQueryResult {
            status: reply.status,
            protocols,
        })
    }
}
