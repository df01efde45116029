//! Configuration change records.

use crate::host::HostKey;
use std::collections::BTreeSet;
use vbridge_types::VlanId;

/// The difference produced by one [`MappingConfig`](crate::MappingConfig)
/// update that changed state.
///
/// An update that changes nothing produces no record at all, so every
/// `ConfigChange` has at least one non-empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChange {
    allow_added: BTreeSet<HostKey>,
    allow_removed: BTreeSet<HostKey>,
    deny_added: BTreeSet<HostKey>,
    deny_removed: BTreeSet<HostKey>,
    removing: bool,
    skip_purge: bool,
}

impl ConfigChange {
    pub(crate) fn new(
        allow: (BTreeSet<HostKey>, BTreeSet<HostKey>),
        deny: (BTreeSet<HostKey>, BTreeSet<HostKey>),
        removing: bool,
        skip_purge: bool,
    ) -> Self {
        Self {
            allow_added: allow.0,
            allow_removed: allow.1,
            deny_added: deny.0,
            deny_removed: deny.1,
            removing,
            skip_purge,
        }
    }

    /// Hosts added to the allowed set.
    pub fn allow_added(&self) -> &BTreeSet<HostKey> {
        &self.allow_added
    }

    /// Hosts removed from the allowed set.
    pub fn allow_removed(&self) -> &BTreeSet<HostKey> {
        &self.allow_removed
    }

    /// Hosts added to the denied set.
    pub fn deny_added(&self) -> &BTreeSet<HostKey> {
        &self.deny_added
    }

    /// Hosts removed from the denied set.
    pub fn deny_removed(&self) -> &BTreeSet<HostKey> {
        &self.deny_removed
    }

    /// Returns true if the update left the configuration empty.
    pub fn is_removing(&self) -> bool {
        self.removing
    }

    /// Advisory hint that only one side of the configuration was touched,
    /// so wildcard-driven bindings need no full re-evaluation.
    ///
    /// Safe to ignore.
    pub fn skip_purge(&self) -> bool {
        self.skip_purge
    }

    /// Returns true if the allowed set changed.
    pub fn is_allow_changed(&self) -> bool {
        !self.allow_added.is_empty() || !self.allow_removed.is_empty()
    }

    /// Returns true if the denied set changed.
    pub fn is_deny_changed(&self) -> bool {
        !self.deny_added.is_empty() || !self.deny_removed.is_empty()
    }

    /// VLANs whose wildcard entry was removed by this change.
    ///
    /// Hosts learned on these VLANs through the wildcard are no longer
    /// mapped unless they are allowed explicitly.
    pub fn unmapped_vlans(&self) -> BTreeSet<VlanId> {
        self.allow_removed
            .iter()
            .filter(|h| h.is_wildcard())
            .map(|h| h.vlan())
            .collect()
    }

    /// Concrete hosts that lost their mapping: removed from the allowed set
    /// or added to the denied set.
    pub fn revoked_hosts(&self) -> BTreeSet<HostKey> {
        self.allow_removed
            .iter()
            .chain(self.deny_added.iter())
            .filter(|h| !h.is_wildcard())
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vbridge_types::MacAddress;

    fn host(mac: u64, vlan: u16) -> HostKey {
        HostKey::from_parts(
            Some(MacAddress::from_u64(mac).unwrap()),
            VlanId::new(vlan).unwrap(),
        )
    }

    #[test]
    fn test_unmapped_vlans_and_revoked_hosts() {
        let change = ConfigChange::new(
            (BTreeSet::new(), [host(0, 10), host(1, 20)].into()),
            ([host(2, 30)].into(), BTreeSet::new()),
            false,
            false,
        );

        assert!(change.is_allow_changed());
        assert!(change.is_deny_changed());
        assert_eq!(change.unmapped_vlans(), BTreeSet::from([VlanId::new(10).unwrap()]));
        assert_eq!(change.revoked_hosts(), BTreeSet::from([host(1, 20), host(2, 30)]));
    }

    #[test]
    fn test_default_is_unchanged() {
        let change = ConfigChange::default();
        assert!(!change.is_allow_changed());
        assert!(!change.is_deny_changed());
        assert!(!change.is_removing());
        assert!(!change.skip_purge());
    }
}
