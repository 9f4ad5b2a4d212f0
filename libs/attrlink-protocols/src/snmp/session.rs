//! SNMP session layer
//!
//! `SnmpSession` is the narrow seam between the adapter and the SNMP
//! client library: multi-varbind GET and SET against one agent. The
//! production implementation issues a fresh UDP client per command, the way
//! short-lived polling sessions behave best; nothing is shared across poll
//! cycles.

use std::time::Duration;

use async_snmp::{Auth, AuthProtocol, Client, Oid, PrivProtocol, UdpClient, Value};
use async_trait::async_trait;
use tracing::{debug, warn};

use attrlink::{LinkError, Result};

use super::types::WireValue;

/// How to authenticate against the agent: an SNMPv2c community string, or
/// SNMPv3 USM credentials.
#[derive(Debug, Clone)]
pub enum SnmpAuthority {
    Community(String),
    Usm {
        user: String,
        auth_key: String,
        priv_key: String,
    },
}

/// Multi-varbind GET/SET against one SNMP agent.
///
/// Any per-object error indication in a response surfaces as an `Err`,
/// aborting the caller's poll cycle; the next cycle retries.
#[async_trait]
pub trait SnmpSession: Send + Sync {
    async fn get(&self, oids: &[Oid]) -> Result<Vec<(Oid, WireValue)>>;

    async fn set(&self, bindings: &[(Oid, WireValue)]) -> Result<()>;
}

/// Production session: one UDP client per command
pub struct UdpSnmpSession {
    target: String,
    authority: SnmpAuthority,
    timeout: Duration,
}

impl UdpSnmpSession {
    pub fn new(
        host: impl AsRef<str>,
        port: u16,
        authority: SnmpAuthority,
        timeout: Duration,
    ) -> Self {
        Self {
            target: format!("{}:{port}", host.as_ref()),
            authority,
            timeout,
        }
    }

    /// USM sessions authenticate with SHA-256 and encrypt with AES-128.
    async fn client(&self) -> Result<UdpClient> {
        let auth = match &self.authority {
            SnmpAuthority::Community(community) => Auth::v2c(community),
            SnmpAuthority::Usm {
                user,
                auth_key,
                priv_key,
            } => Auth::usm(user)
                .auth_priv(
                    AuthProtocol::Sha256,
                    auth_key,
                    PrivProtocol::Aes128,
                    priv_key,
                )
                .into(),
        };

        Client::builder(self.target.as_str(), auth)
            .timeout(self.timeout)
            .connect()
            .await
            .map_err(|e| {
                LinkError::connection(format!("SNMP session to {}: {e}", self.target))
            })
    }
}

#[async_trait]
impl SnmpSession for UdpSnmpSession {
    async fn get(&self, oids: &[Oid]) -> Result<Vec<(Oid, WireValue)>> {
        let client = self.client().await?;
        let varbinds = client
            .get_many(oids)
            .await
            .map_err(|e| LinkError::protocol(format!("SNMP GET failed: {e}")))?;
        debug!("GET returned {} objects from {}", varbinds.len(), self.target);

        let mut values = Vec::with_capacity(varbinds.len());
        for varbind in varbinds {
            match wire_value(&varbind.value) {
                Ok(value) => values.push((varbind.oid.clone(), value)),
                Err(e) => warn!("skipping {}: {e}", varbind.oid),
            }
        }
        Ok(values)
    }

    async fn set(&self, bindings: &[(Oid, WireValue)]) -> Result<()> {
        let client = self.client().await?;
        let varbinds: Vec<(Oid, Value)> = bindings
            .iter()
            .map(|(oid, value)| (oid.clone(), snmp_value(value)))
            .collect();

        // The values echoed back from a SET are just what we put in; the
        // device's externalized state is only trusted from a later GET.
        client
            .set_many(&varbinds)
            .await
            .map_err(|e| LinkError::protocol(format!("SNMP SET failed: {e}")))?;
        Ok(())
    }
}

fn wire_value(value: &Value) -> Result<WireValue> {
    if let Some(i) = value.as_i32() {
        return Ok(WireValue::Int(i64::from(i)));
    }
    if let Some(bytes) = value.as_bytes() {
        return Ok(WireValue::Bytes(bytes.to_vec()));
    }
    if let Some(text) = value.as_str() {
        return Ok(WireValue::Text(text.to_string()));
    }
    Err(LinkError::protocol(format!(
        "unsupported SNMP value type: {value:?}"
    )))
}

fn snmp_value(value: &WireValue) -> Value {
    match value {
        WireValue::Int(i) => Value::Integer(*i as i32),
        WireValue::Bytes(bytes) => Value::OctetString(bytes.clone().into()),
        WireValue::Text(text) => Value::OctetString(text.clone().into_bytes().into()),
    }
}
