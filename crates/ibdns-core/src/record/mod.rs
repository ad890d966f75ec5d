// # Record Model
//
// The record descriptor is the only entity the system manages. It carries
// both the user's desired fields and the fields computed from remote reads.
//
// ## Field Mutability
//
// - Fixed after creation: `type`, `name`, `domain`, `nextavailableip`, `view`
// - Mutable in place: `value`, `ttl`, `comment`
// - Computed: `fqdn`, `ipv4addr`, `ipv6addr`, `id`

pub mod kind;
pub mod wire;

pub use kind::{BodyFields, RecordType};
pub use wire::{HostIpv4Addr, RecordA, RecordAaaa, RecordBody, RecordCname, RecordHost, RemoteRecord};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of the allocation directive understood by the store
pub const NEXT_AVAILABLE_IP_PREFIX: &str = "func:nextavailableip:";

/// Build the directive asking the store for the next free address in `range`
pub fn next_available_ip_directive(range: &str) -> String {
    format!("{}{}", NEXT_AVAILABLE_IP_PREFIX, range)
}

/// Join a host label and a domain into a fully qualified name
pub fn join_fqdn(name: &str, domain: &str) -> String {
    [name, domain].join(".")
}

/// Split a remote name into `(name, domain)`
///
/// The first label is the host part; everything after it is the domain.
/// A multi-label host such as `foo.bar` therefore comes back as
/// `("foo", "bar.<domain>")`.
pub fn split_fqdn(fqdn: &str) -> (String, String) {
    let mut labels = fqdn.split('.');
    let name = labels.next().unwrap_or_default().to_string();
    let domain = labels.collect::<Vec<_>>().join(".");
    (name, domain)
}

/// Desired and observed state of one DNS record
///
/// Serializes with the attribute names of the resource schema, so the same
/// shape is used for the desired-resources file and the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// Record type as supplied (A, AAAA, CNAME, HOST; any case)
    #[serde(rename = "type")]
    pub record_type: String,

    /// Host label
    pub name: String,

    /// Domain the host label lives in
    pub domain: String,

    /// Address, canonical target, or allocation range
    pub value: String,

    /// Allocate the next free address from the range held in `value`
    #[serde(default, rename = "nextavailableip")]
    pub next_available_ip: bool,

    /// Time-to-live in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Free-form comment stored with the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// DNS view; the store's default view when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    /// Fully qualified name as reported by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,

    /// Resolved IPv4 address (A and HOST)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4addr: Option<String>,

    /// Resolved IPv6 address (AAAA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6addr: Option<String>,

    /// Opaque store identifier; `None` until the record is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RecordDescriptor {
    /// Create a descriptor with the required fields
    pub fn new(
        record_type: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            name: name.into(),
            domain: domain.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Set the time-to-live
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the view
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Treat `value` as a range to allocate from
    pub fn with_next_available_ip(mut self, enabled: bool) -> Self {
        self.next_available_ip = enabled;
        self
    }

    /// Parse the record type
    ///
    /// Fails with [`crate::Error::UnknownType`] for anything outside the
    /// closed set.
    pub fn kind(&self) -> Result<RecordType> {
        self.record_type.parse()
    }

    /// The fully qualified name built from `name` and `domain`
    pub fn desired_fqdn(&self) -> String {
        join_fqdn(&self.name, &self.domain)
    }

    /// Whether the store has assigned an identifier
    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }
}
