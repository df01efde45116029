//! Host and network keys.
//!
//! A [`HostKey`] names a host by MAC address and VLAN, a [`PortVlan`] names
//! the physical broadcast domain a host is reached through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vbridge_types::{MacAddress, ParseError, SwitchPort, VlanId};

/// A host identity: MAC address plus VLAN ID.
///
/// A key without a MAC address is the wildcard, meaning "any host on this
/// VLAN". The all-zero MAC address is never stored as a concrete address;
/// it is the wildcard's packed encoding.
///
/// # Examples
///
/// ```
/// use vbridge_macmap::HostKey;
///
/// let host: HostKey = "00:00:00:00:00:01@10".parse().unwrap();
/// assert_eq!(host.encode(), (10 << 48) | 1);
/// assert_eq!(HostKey::decode(host.encode()).unwrap(), host);
///
/// let any: HostKey = "*@10".parse().unwrap();
/// assert!(any.is_wildcard());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    mac: Option<MacAddress>,
    vlan: VlanId,
}

impl HostKey {
    /// Bit offset of the VLAN ID in the packed encoding.
    const VLAN_SHIFT: u32 = 48;

    /// Creates a key for a concrete MAC address.
    ///
    /// The zero address is folded into the wildcard.
    pub fn new(mac: MacAddress, vlan: VlanId) -> Self {
        Self::from_parts(Some(mac), vlan)
    }

    /// Creates the wildcard key for a VLAN.
    pub const fn wildcard(vlan: VlanId) -> Self {
        Self { mac: None, vlan }
    }

    /// Creates a key from an optional MAC address.
    pub fn from_parts(mac: Option<MacAddress>, vlan: VlanId) -> Self {
        Self {
            mac: mac.filter(|m| !m.is_zero()),
            vlan,
        }
    }

    /// Returns the MAC address, or `None` for the wildcard.
    pub const fn mac(&self) -> Option<MacAddress> {
        self.mac
    }

    /// Returns the VLAN ID.
    pub const fn vlan(&self) -> VlanId {
        self.vlan
    }

    /// Returns true if this key matches any host on its VLAN.
    pub const fn is_wildcard(&self) -> bool {
        self.mac.is_none()
    }

    /// Packs this key into a `u64`: MAC in bits 0-47, VLAN in bits 48-59.
    pub fn encode(&self) -> u64 {
        let mac = self.mac.map(|m| m.to_u64()).unwrap_or(0);
        (u64::from(self.vlan.as_u16()) << Self::VLAN_SHIFT) | mac
    }

    /// Unpacks a key produced by [`HostKey::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if any of bits 60-63 is set.
    pub fn decode(value: u64) -> Result<Self, ParseError> {
        let raw_vlan = value >> Self::VLAN_SHIFT;
        let vlan = u16::try_from(raw_vlan)
            .map_err(|_| ParseError::InvalidVlanFormat(format!("{value:#x}")))?;
        let vlan = VlanId::new(vlan)?;
        let mac = MacAddress::from_u64(value & MacAddress::MASK)?;

        Ok(Self::new(mac, vlan))
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{}@{}", mac, self.vlan),
            None => write!(f, "*@{}", self.vlan),
        }
    }
}

impl FromStr for HostKey {
    type Err = ParseError;

    /// Parses either `"<mac>@<vlan>"` (`"*"` for the wildcard) or the
    /// decimal packed encoding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((mac, vlan)) = s.split_once('@') else {
            let value: u64 = s
                .parse()
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
            return Self::decode(value);
        };

        let vlan: VlanId = vlan.parse()?;
        let mac = match mac {
            "*" => None,
            mac => Some(mac.parse::<MacAddress>()?),
        };

        Ok(Self::from_parts(mac, vlan))
    }
}

/// Unvalidated host descriptor as supplied by an administrative request.
///
/// The VLAN ID is kept raw so that range errors are reported against the
/// host set being updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostDesc {
    pub mac: Option<MacAddress>,
    pub vlan: u16,
}

impl HostDesc {
    /// Creates a descriptor for a concrete MAC address.
    pub fn new(mac: MacAddress, vlan: u16) -> Self {
        Self {
            mac: Some(mac),
            vlan,
        }
    }

    /// Creates a descriptor matching any host on the VLAN.
    pub fn any(vlan: u16) -> Self {
        Self { mac: None, vlan }
    }
}

/// A physical broadcast domain: a switch port plus a VLAN ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortVlan {
    pub port: SwitchPort,
    pub vlan: VlanId,
}

impl PortVlan {
    /// Creates a new network key.
    pub const fn new(port: SwitchPort, vlan: VlanId) -> Self {
        Self { port, vlan }
    }
}

impl fmt::Display for PortVlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.port, self.vlan)
    }
}
