//! ProXR relay board adapter
//!
//! Drives ProXR relay boards over their byte protocol. Each poll cycle
//! acquires one TCP connection, sends every pending ON/OFF command, then
//! reads every due relay, and drops the connection on the way out -
//! including every error path.
//!
//! Command acknowledgements are validated and logged but never update
//! state: the bonus read issued in the same cycle is what confirms a write
//! actually moved the relay.

pub mod client;
pub mod codec;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use attrlink::{
    AttrKind, AttrRegistry, AttrSpec, AttrValue, LinkError, PollAdapter, PollRequest,
    PollResponse, Result,
};
use attrlink_config::ExpandedAttr;

pub use client::{ProxrClientConfig, ProxrConnection};
pub use codec::{RelayVerb, RESPONSE_LEN};

/// Protocol identity of one relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayAddress {
    pub relay: u8,
    pub bank: u8,
}

/// One command/response exchange over an open relay link
#[async_trait]
pub trait RelayExchange: Send {
    async fn exchange(&mut self, frame: &[u8], response_len: usize) -> Result<Vec<u8>>;
}

#[async_trait]
impl RelayExchange for ProxrConnection {
    async fn exchange(&mut self, frame: &[u8], response_len: usize) -> Result<Vec<u8>> {
        ProxrConnection::exchange(self, frame, response_len).await
    }
}

/// Opens one connection per poll cycle
#[async_trait]
pub trait RelayConnector: Send + Sync {
    type Conn: RelayExchange;

    async fn connect(&self) -> Result<Self::Conn>;
}

/// Production connector: a fresh TCP connection per cycle
#[derive(Debug, Clone)]
pub struct TcpRelayConnector {
    config: ProxrClientConfig,
}

impl TcpRelayConnector {
    pub fn new(config: ProxrClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RelayConnector for TcpRelayConnector {
    type Conn = ProxrConnection;

    async fn connect(&self) -> Result<ProxrConnection> {
        ProxrConnection::open(&self.config).await
    }
}

/// Build the attribute registry for one relay board.
///
/// Relay attributes are boolean; the relay index comes from the numeric
/// suffix of the attribute name.
pub fn build_registry(attrs: &[ExpandedAttr], bank: u8) -> Result<AttrRegistry<RelayAddress>> {
    let specs = attrs
        .iter()
        .map(|attr| {
            if attr.kind != AttrKind::Bool {
                return Err(LinkError::config(format!(
                    "relay attribute {:?} must be dtype bool, not {}",
                    attr.name,
                    attr.kind.type_name()
                )));
            }
            Ok(AttrSpec {
                name: attr.name.clone(),
                kind: attr.kind.clone(),
                access: attr.access,
                polling_period: attr.polling_period,
                identity: RelayAddress {
                    relay: codec::relay_index(&attr.name)?,
                    bank,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;
    AttrRegistry::new(specs)
}

/// Poll adapter for ProXR relay boards
pub struct ProxrAdapter<C: RelayConnector> {
    registry: Arc<AttrRegistry<RelayAddress>>,
    connector: C,
}

impl<C: RelayConnector> ProxrAdapter<C> {
    pub fn new(registry: Arc<AttrRegistry<RelayAddress>>, connector: C) -> Self {
        Self {
            registry,
            connector,
        }
    }
}

#[async_trait]
impl<C: RelayConnector> PollAdapter for ProxrAdapter<C> {
    type Converted = bool;

    fn from_native(&self, name: &str, value: &AttrValue) -> Result<bool> {
        self.registry.lookup(name)?;
        value.as_bool().ok_or_else(|| {
            LinkError::conversion(format!(
                "{name} expects a boolean, got {}",
                value.type_name()
            ))
        })
    }

    async fn poll(&self, request: PollRequest<bool>) -> Result<PollResponse> {
        if request.is_empty() {
            return Ok(PollResponse::new());
        }

        // One connection for the whole cycle; dropped on every exit path.
        let mut conn = self.connector.connect().await?;

        // Commands first, in registry order, so the bonus reads below see
        // the new relay positions.
        for spec in self.registry.iter() {
            if let Some(&on) = request.writes.get(&spec.name) {
                let frame =
                    codec::command_frame(RelayVerb::for_write(on), spec.identity.relay, spec.identity.bank);
                let ack = conn.exchange(&frame, RESPONSE_LEN).await?;
                // The acknowledgement proves receipt, not relay position;
                // state is only updated from the read below.
                let body = codec::unmarshal(&ack)?;
                debug!(
                    "{} command acknowledged (status {:#04x})",
                    spec.name,
                    body.last().copied().unwrap_or_default()
                );
            }
        }

        let mut response = PollResponse::new();
        for name in &request.reads {
            let spec = self.registry.lookup(name)?;
            let frame = codec::command_frame(RelayVerb::Read, spec.identity.relay, spec.identity.bank);
            let raw = conn.exchange(&frame, RESPONSE_LEN).await?;
            let on = codec::read_relay_state(&raw)?;
            response.insert(name.clone(), AttrValue::Bool(on));
        }

        Ok(response)
    }
}
