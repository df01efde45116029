//! MAC mapping configuration: the allowed and denied host sets.

use crate::change::ConfigChange;
use crate::error::{MacMapError, Result};
use crate::host::{HostDesc, HostKey};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use vbridge_types::{MacAddress, VlanId};

/// How an update combines the supplied hosts with the current set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOperation {
    /// Replace the set wholesale.
    #[default]
    Set,
    /// Add hosts to the set.
    Add,
    /// Remove hosts from the set.
    Remove,
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOperation::Set => write!(f, "set"),
            UpdateOperation::Add => write!(f, "add"),
            UpdateOperation::Remove => write!(f, "remove"),
        }
    }
}

/// Selects one of the two host sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclType {
    Allow,
    Deny,
}

impl fmt::Display for AclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclType::Allow => write!(f, "allowed"),
            AclType::Deny => write!(f, "denied"),
        }
    }
}

/// Added and removed hosts for one side of an update.
type SetDiff = (BTreeSet<HostKey>, BTreeSet<HostKey>);

/// Administrator-specified host sets of a MAC mapping.
///
/// `allowed` may contain wildcard entries (any host on a VLAN) and maps a
/// concrete MAC address to at most one VLAN. `denied` only contains
/// concrete hosts and takes precedence over `allowed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    allowed: BTreeSet<HostKey>,
    denied: BTreeSet<HostKey>,
}

impl MappingConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the allowed host set.
    pub fn allowed(&self) -> &BTreeSet<HostKey> {
        &self.allowed
    }

    /// Returns the denied host set.
    pub fn denied(&self) -> &BTreeSet<HostKey> {
        &self.denied
    }

    /// Returns true if both host sets are empty.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty() && self.denied.is_empty()
    }

    /// Returns true if the host is explicitly denied.
    pub fn is_denied(&self, host: &HostKey) -> bool {
        self.denied.contains(host)
    }

    /// VLANs that carry a wildcard entry in the allowed set.
    pub fn wildcard_vlans(&self) -> BTreeSet<VlanId> {
        self.allowed
            .iter()
            .filter(|h| h.is_wildcard())
            .map(|h| h.vlan())
            .collect()
    }

    /// Allowed hosts with a concrete MAC address.
    pub fn concrete_allowed(&self) -> BTreeSet<HostKey> {
        self.allowed
            .iter()
            .filter(|h| !h.is_wildcard())
            .copied()
            .collect()
    }

    /// Returns the allowed entry that maps the given MAC address.
    pub fn allowed_for_mac(&self, mac: &MacAddress) -> Option<&HostKey> {
        self.allowed.iter().find(|h| h.mac().as_ref() == Some(mac))
    }

    /// Returns true if a concrete host is mapped by this configuration.
    ///
    /// Broadcast, multicast and denied hosts are never mapped. A MAC address
    /// allowed explicitly is mapped only on its own VLAN; any other host is
    /// mapped when its VLAN carries a wildcard entry.
    pub fn accepts(&self, host: &HostKey) -> bool {
        let Some(mac) = host.mac() else {
            return false;
        };
        if !mac.is_unicast() || self.denied.contains(host) {
            return false;
        }

        match self.allowed_for_mac(&mac) {
            Some(entry) => entry == host,
            None => self.allowed.contains(&HostKey::wildcard(host.vlan())),
        }
    }

    /// Updates both host sets.
    ///
    /// `op` defaults to [`UpdateOperation::Set`]. For `Set`, an omitted list
    /// means the empty list; for `Add` and `Remove` it leaves that side
    /// untouched.
    ///
    /// Returns `None` if the update changed nothing. On error the
    /// configuration is left unchanged.
    pub fn update(
        &mut self,
        op: Option<UpdateOperation>,
        allowed: Option<&[Option<HostDesc>]>,
        denied: Option<&[Option<HostDesc>]>,
    ) -> Result<Option<ConfigChange>> {
        let op = op.unwrap_or_default();
        let allowed = Self::hosts_for(op, allowed);
        let denied = Self::hosts_for(op, denied);

        let allow_diff = match allowed {
            Some(list) => Some(self.allow_diff(op, list)?),
            None => None,
        };
        let deny_diff = match denied {
            Some(list) => Some(self.deny_diff(op, list)?),
            None => None,
        };

        Ok(self.apply(allow_diff, deny_diff, false))
    }

    /// Updates exactly one host set, leaving the other untouched.
    ///
    /// Change records produced here carry the `skip_purge` hint.
    pub fn update_acl(
        &mut self,
        op: Option<UpdateOperation>,
        acl: AclType,
        hosts: Option<&[Option<HostDesc>]>,
    ) -> Result<Option<ConfigChange>> {
        let op = op.unwrap_or_default();
        let Some(list) = Self::hosts_for(op, hosts) else {
            return Ok(None);
        };

        let change = match acl {
            AclType::Allow => {
                let diff = self.allow_diff(op, list)?;
                self.apply(Some(diff), None, true)
            }
            AclType::Deny => {
                let diff = self.deny_diff(op, list)?;
                self.apply(None, Some(diff), true)
            }
        };

        Ok(change)
    }

    fn hosts_for(
        op: UpdateOperation,
        list: Option<&[Option<HostDesc>]>,
    ) -> Option<&[Option<HostDesc>]> {
        match (op, list) {
            (UpdateOperation::Set, None) => Some(&[]),
            (_, list) => list,
        }
    }

    /// Validates an allowed list and computes its diff against the current
    /// allowed set.
    fn allow_diff(&self, op: UpdateOperation, list: &[Option<HostDesc>]) -> Result<SetDiff> {
        let mut hosts = BTreeSet::new();
        let mut macs: HashMap<MacAddress, HostKey> = HashMap::new();

        for desc in list {
            let host = validate(desc.as_ref(), AclType::Allow)?;
            if let Some(mac) = host.mac() {
                if let Some(other) = macs.insert(mac, host) {
                    if other != host {
                        return Err(MacMapError::DuplicateMac { host, other });
                    }
                }
            }
            hosts.insert(host);
        }

        let (added, removed) = diff(&self.allowed, hosts, op);

        for host in &added {
            let Some(mac) = host.mac() else {
                continue;
            };
            if let Some(existing) = self.allowed_for_mac(&mac) {
                if existing != host && !removed.contains(existing) {
                    return Err(MacMapError::AlreadyMapped {
                        host: *host,
                        existing: *existing,
                    });
                }
            }
        }

        Ok((added, removed))
    }

    /// Validates a denied list and computes its diff against the current
    /// denied set.
    fn deny_diff(&self, op: UpdateOperation, list: &[Option<HostDesc>]) -> Result<SetDiff> {
        let hosts = list
            .iter()
            .map(|desc| validate(desc.as_ref(), AclType::Deny))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(diff(&self.denied, hosts, op))
    }

    fn apply(
        &mut self,
        allow: Option<SetDiff>,
        deny: Option<SetDiff>,
        skip_purge: bool,
    ) -> Option<ConfigChange> {
        let allow = allow.unwrap_or_default();
        let deny = deny.unwrap_or_default();
        if allow.0.is_empty() && allow.1.is_empty() && deny.0.is_empty() && deny.1.is_empty() {
            trace!("MAC mapping configuration not changed");
            return None;
        }

        for host in &allow.1 {
            self.allowed.remove(host);
        }
        self.allowed.extend(allow.0.iter().copied());
        for host in &deny.1 {
            self.denied.remove(host);
        }
        self.denied.extend(deny.0.iter().copied());

        let removing = self.is_empty();
        debug!(
            "MAC mapping configuration changed: allow +{}/-{}, deny +{}/-{}, removing={}",
            allow.0.len(),
            allow.1.len(),
            deny.0.len(),
            deny.1.len(),
            removing
        );

        Some(ConfigChange::new(allow, deny, removing, skip_purge))
    }
}

/// Validates one host descriptor for the given host set.
fn validate(desc: Option<&HostDesc>, acl: AclType) -> Result<HostKey> {
    let desc = desc.ok_or(MacMapError::MissingHost { acl })?;
    let vlan = VlanId::new(desc.vlan).map_err(|source| MacMapError::InvalidVlan { acl, source })?;

    let Some(mac) = desc.mac else {
        if acl == AclType::Deny {
            return Err(MacMapError::NullDeniedMac { vlan: desc.vlan });
        }
        return Ok(HostKey::wildcard(vlan));
    };

    if mac.is_zero() {
        return Err(MacMapError::ZeroAddress {
            acl,
            vlan: desc.vlan,
        });
    }
    if mac.is_broadcast() {
        return Err(MacMapError::BroadcastAddress {
            acl,
            vlan: desc.vlan,
        });
    }
    if mac.is_multicast() {
        return Err(MacMapError::MulticastAddress {
            acl,
            mac,
            vlan: desc.vlan,
        });
    }

    Ok(HostKey::new(mac, vlan))
}

/// Computes the (added, removed) sets an operation would apply to `current`.
fn diff(current: &BTreeSet<HostKey>, hosts: BTreeSet<HostKey>, op: UpdateOperation) -> SetDiff {
    match op {
        UpdateOperation::Add => {
            let added = hosts.difference(current).copied().collect();
            (added, BTreeSet::new())
        }
        UpdateOperation::Remove => {
            let removed = hosts.intersection(current).copied().collect();
            (BTreeSet::new(), removed)
        }
        UpdateOperation::Set => {
            let added = hosts.difference(current).copied().collect();
            let removed = current.difference(&hosts).copied().collect();
            (added, removed)
        }
    }
}
