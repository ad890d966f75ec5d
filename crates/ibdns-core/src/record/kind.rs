//! The closed set of record types and their per-type behavior
//!
//! Every place where the record type changes what is sent or read is a
//! method here with one arm per variant, so the four types stay in step.

use std::fmt;
use std::str::FromStr;

use super::wire::{HostIpv4Addr, RecordA, RecordAaaa, RecordBody, RecordCname, RecordHost, RemoteRecord};
use super::RecordDescriptor;
use crate::error::Error;

/// DNS record type managed by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Alias to a canonical name
    Cname,
    /// Host record with a list of IPv4 addresses
    Host,
}

/// Fields shared by every request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyFields {
    /// Fully qualified name
    pub name: String,
    /// Address, allocation directive, or canonical target
    pub value: String,
    pub comment: Option<String>,
    pub ttl: Option<u32>,
    /// Only set on create
    pub view: Option<String>,
}

impl RecordType {
    /// All supported types
    pub const ALL: [RecordType; 4] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Host,
    ];

    /// Canonical uppercase spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Host => "HOST",
        }
    }

    /// Name of the field holding the type's address or target
    pub fn address_field(&self) -> &'static str {
        match self {
            RecordType::A => "ipv4addr",
            RecordType::Aaaa => "ipv6addr",
            RecordType::Cname => "canonical",
            RecordType::Host => "ipv4addrs",
        }
    }

    /// Fields requested from the store on create, update and read
    pub fn return_fields(&self) -> &'static [&'static str] {
        match self {
            RecordType::A => &["name", "ipv4addr", "ttl", "view"],
            RecordType::Aaaa => &["name", "ipv6addr", "ttl", "view"],
            RecordType::Cname => &["name", "canonical", "ttl", "view"],
            RecordType::Host => &["name", "ipv4addrs", "ttl", "view"],
        }
    }

    /// Whether the type carries an address the store can allocate
    pub fn allocates_addresses(&self) -> bool {
        !matches!(self, RecordType::Cname)
    }

    /// Build the type-specific request body
    pub fn build_body(&self, fields: BodyFields) -> RecordBody {
        let BodyFields {
            name,
            value,
            comment,
            ttl,
            view,
        } = fields;

        match self {
            RecordType::A => RecordBody::A(RecordA {
                name,
                ipv4addr: value,
                comment,
                ttl,
                view,
            }),
            RecordType::Aaaa => RecordBody::Aaaa(RecordAaaa {
                name,
                ipv6addr: value,
                comment,
                ttl,
                view,
            }),
            RecordType::Cname => RecordBody::Cname(RecordCname {
                name,
                canonical: value,
                comment,
                ttl,
                view,
            }),
            RecordType::Host => RecordBody::Host(RecordHost {
                name,
                ipv4addrs: vec![HostIpv4Addr { ipv4addr: value }],
                comment,
                ttl,
                view,
            }),
        }
    }

    /// The last address resolved by the store for this descriptor
    pub fn resolved_address<'a>(&self, desc: &'a RecordDescriptor) -> Option<&'a str> {
        match self {
            RecordType::A | RecordType::Host => desc.ipv4addr.as_deref(),
            RecordType::Aaaa => desc.ipv6addr.as_deref(),
            RecordType::Cname => None,
        }
    }

    /// Copy the type-specific fields of a remote record into `desc`
    ///
    /// With `nextavailableip` set, `value` keeps the allocation range and
    /// only the computed address field is refreshed.
    pub fn apply_remote(&self, remote: &RemoteRecord, desc: &mut RecordDescriptor) {
        let keep_value = desc.next_available_ip;

        match self {
            RecordType::A => {
                desc.ipv4addr = remote.ipv4addr.clone();
                if let Some(addr) = &remote.ipv4addr
                    && !keep_value
                {
                    desc.value = addr.clone();
                }
            }
            RecordType::Aaaa => {
                desc.ipv6addr = remote.ipv6addr.clone();
                if let Some(addr) = &remote.ipv6addr
                    && !keep_value
                {
                    desc.value = addr.clone();
                }
            }
            RecordType::Cname => {
                if let Some(canonical) = &remote.canonical {
                    desc.value = canonical.clone();
                }
            }
            RecordType::Host => {
                // No address entries: leave the fields as they are
                let first = remote.ipv4addrs.as_ref().and_then(|addrs| addrs.first());
                if let Some(entry) = first {
                    desc.ipv4addr = Some(entry.ipv4addr.clone());
                    if !keep_value {
                        desc.value = entry.ipv4addr.clone();
                    }
                }
            }
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "HOST" => Ok(RecordType::Host),
            _ => Err(Error::unknown_type(s)),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
