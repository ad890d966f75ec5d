//! Request and response shapes exchanged with the record store
//!
//! Each record type has its own request body carrying only the fields
//! that type understands. Absent optionals are never serialized, which is
//! how an update leaves `view` out of its payload.

use serde::{Deserialize, Serialize};

use super::RecordType;

/// One address entry of a host record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIpv4Addr {
    pub ipv4addr: String,
}

/// Request body for an A record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordA {
    pub name: String,
    pub ipv4addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Request body for an AAAA record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAaaa {
    pub name: String,
    pub ipv6addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Request body for a CNAME record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCname {
    pub name: String,
    pub canonical: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Request body for a host record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHost {
    pub name: String,
    pub ipv4addrs: Vec<HostIpv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// Type-specific request body sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordBody {
    A(RecordA),
    Aaaa(RecordAaaa),
    Cname(RecordCname),
    Host(RecordHost),
}

impl RecordBody {
    /// The record type this body targets
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordBody::A(_) => RecordType::A,
            RecordBody::Aaaa(_) => RecordType::Aaaa,
            RecordBody::Cname(_) => RecordType::Cname,
            RecordBody::Host(_) => RecordType::Host,
        }
    }

    /// Fully qualified name carried by the body
    pub fn name(&self) -> &str {
        match self {
            RecordBody::A(body) => &body.name,
            RecordBody::Aaaa(body) => &body.name,
            RecordBody::Cname(body) => &body.name,
            RecordBody::Host(body) => &body.name,
        }
    }

    /// The submitted address or canonical target
    ///
    /// For host records this is the first address entry.
    pub fn value(&self) -> Option<&str> {
        match self {
            RecordBody::A(body) => Some(&body.ipv4addr),
            RecordBody::Aaaa(body) => Some(&body.ipv6addr),
            RecordBody::Cname(body) => Some(&body.canonical),
            RecordBody::Host(body) => body.ipv4addrs.first().map(|a| a.ipv4addr.as_str()),
        }
    }

    /// The view carried by the body, if any
    pub fn view(&self) -> Option<&str> {
        match self {
            RecordBody::A(body) => body.view.as_deref(),
            RecordBody::Aaaa(body) => body.view.as_deref(),
            RecordBody::Cname(body) => body.view.as_deref(),
            RecordBody::Host(body) => body.view.as_deref(),
        }
    }

    /// The comment carried by the body, if any
    pub fn comment(&self) -> Option<&str> {
        match self {
            RecordBody::A(body) => body.comment.as_deref(),
            RecordBody::Aaaa(body) => body.comment.as_deref(),
            RecordBody::Cname(body) => body.comment.as_deref(),
            RecordBody::Host(body) => body.comment.as_deref(),
        }
    }
}

/// A record object as returned by the store
///
/// The store only returns the fields that were asked for, so everything
/// besides the reference is optional. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(rename = "_ref")]
    pub reference: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ipv4addr: Option<String>,
    #[serde(default)]
    pub ipv6addr: Option<String>,
    #[serde(default)]
    pub canonical: Option<String>,
    #[serde(default)]
    pub ipv4addrs: Option<Vec<HostIpv4Addr>>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}
