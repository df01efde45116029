//! Error types for MAC mapping operations.

use crate::config::AclType;
use crate::host::HostKey;
use crate::mapping::MappingId;
use thiserror::Error;
use vbridge_types::{MacAddress, ParseError};

/// Errors raised by configuration updates and host activation.
///
/// All of these indicate a problem with the request, not a transient
/// condition. The configuration or status table is left exactly as it was
/// before the failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacMapError {
    #[error("{acl} host set: missing host descriptor")]
    MissingHost { acl: AclType },

    #[error("{acl} host set: {source}")]
    InvalidVlan { acl: AclType, source: ParseError },

    #[error("{acl} host set: zero MAC address cannot be specified: vlan={vlan}")]
    ZeroAddress { acl: AclType, vlan: u16 },

    #[error("{acl} host set: broadcast MAC address cannot be specified: vlan={vlan}")]
    BroadcastAddress { acl: AclType, vlan: u16 },

    #[error("{acl} host set: multicast MAC address cannot be specified: {mac}, vlan={vlan}")]
    MulticastAddress {
        acl: AclType,
        mac: MacAddress,
        vlan: u16,
    },

    #[error("MAC address cannot be null in denied host set: vlan={vlan}")]
    NullDeniedMac { vlan: u16 },

    #[error("duplicate MAC address in allowed set: {host}, {other}")]
    DuplicateMac { host: HostKey, other: HostKey },

    #[error("{host}: MAC address already mapped to this mapping: {existing}")]
    AlreadyMapped { host: HostKey, existing: HostKey },

    #[error("{mapping}: MAC address already activated on another VLAN: host={host}, existing={existing}")]
    DuplicateHost {
        mapping: MappingId,
        host: HostKey,
        existing: HostKey,
    },

    #[error("{mapping}: {host}: port is busy, reserved by {owner} via {existing}")]
    PortBusy {
        mapping: MappingId,
        host: HostKey,
        existing: HostKey,
        owner: String,
    },

    #[error("{mapping}: wildcard host cannot be activated: {host}")]
    WildcardBinding { mapping: MappingId, host: HostKey },

    #[error("{mapping}: broadcast or multicast host cannot be activated: {host}")]
    NonUnicastHost { mapping: MappingId, host: HostKey },
}

impl MacMapError {
    /// Converts a duplicate host error into a port busy error.
    ///
    /// The collaborator layer uses this when the conflicting binding belongs
    /// to another interface that reserves the same host. Other errors are
    /// returned unchanged.
    pub fn into_port_busy(self, owner: impl Into<String>) -> Self {
        match self {
            MacMapError::DuplicateHost {
                mapping,
                host,
                existing,
            } => MacMapError::PortBusy {
                mapping,
                host,
                existing,
                owner: owner.into(),
            },
            other => other,
        }
    }

    /// Returns the conflicting host bound to the same MAC address, if any.
    pub fn conflicting_host(&self) -> Option<&HostKey> {
        match self {
            MacMapError::DuplicateMac { other, .. } => Some(other),
            MacMapError::AlreadyMapped { existing, .. }
            | MacMapError::DuplicateHost { existing, .. }
            | MacMapError::PortBusy { existing, .. } => Some(existing),
            _ => None,
        }
    }

    /// Returns true if this error was caused by an invalid host descriptor.
    pub fn is_invalid_host(&self) -> bool {
        matches!(
            self,
            MacMapError::MissingHost { .. }
                | MacMapError::InvalidVlan { .. }
                | MacMapError::ZeroAddress { .. }
                | MacMapError::BroadcastAddress { .. }
                | MacMapError::MulticastAddress { .. }
                | MacMapError::NullDeniedMac { .. }
                | MacMapError::NonUnicastHost { .. }
        )
    }
}

/// Result type for MAC mapping operations.
pub type Result<T> = std::result::Result<T, MacMapError>;
