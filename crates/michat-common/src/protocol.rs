//! Rendezvous wire types.
//!
//! Both message types travel as JSON inside an encrypted envelope (see
//! `michat-crypto`). The short field names are part of the protocol and
//! must not change.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-address identifier minted by the relay.
///
/// Rendered as 32 lowercase hex characters without separators. Peers learn
/// each other's token out-of-band and use it to address a mailbox slot.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh random 128-bit token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.0)
    }
}

/// Inbound request: publish `publisher_key` into the slot of `target_session`
/// and ask to be introduced to whoever owns that slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionRequest {
    #[serde(rename = "u")]
    pub target_session: SessionToken,
    /// Base64 DER (X.509 SubjectPublicKeyInfo) RSA public key.
    #[serde(rename = "p")]
    pub publisher_key: String,
}

/// Outbound notice: the observed address of a peer plus a public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionNotice {
    #[serde(rename = "po")]
    pub port: u16,
    #[serde(rename = "ip")]
    pub host: String,
    #[serde(rename = "p")]
    pub key: String,
}

impl IntroductionNotice {
    /// Build a notice describing the observed sender `addr`.
    pub fn for_peer(addr: SocketAddr, key: impl Into<String>) -> Self {
        Self {
            port: addr.port(),
            host: display_host(addr.ip()),
            key: key.into(),
        }
    }
}

/// Textual host for an observed address.
///
/// Dual-stack sockets report IPv4 peers as IPv4-mapped IPv6 addresses;
/// those are rendered in dotted IPv4 form.
pub fn display_host(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(mapped) => mapped.to_string(),
            None => v6.to_string(),
        },
    }
}
