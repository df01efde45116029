//! The MAC mapping owner.
//!
//! A [`MacMapping`] pairs one mapping's configuration with its activation
//! status and keeps the two consistent: every configuration change is
//! applied to the status table before the call returns.

use crate::audit::{AuditCategory, AuditRecord};
use crate::change::ConfigChange;
use crate::config::{AclType, MappingConfig, UpdateOperation};
use crate::error::Result;
use crate::filter::PortFilter;
use crate::host::{HostDesc, HostKey, PortVlan};
use crate::status::{Activation, ActivationStatus};
use crate::store::{MappingStore, StoreResult};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use vbridge_types::SwitchPort;

/// Identity of the mapping that owns a configuration and status table.
///
/// Used for log attribution and as the store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingId(String);

impl MappingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MappingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MappingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Settings of a [`MacMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacMappingConfig {
    /// Emit audit records for configuration changes.
    pub audit: bool,
}

impl Default for MacMappingConfig {
    fn default() -> Self {
        Self { audit: true }
    }
}

impl MacMappingConfig {
    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }
}

/// One MAC mapping: its host sets and the hosts currently bound through it.
///
/// Methods take `&mut self`; callers sharing a mapping between tasks wrap it
/// in a `tokio::sync::Mutex`.
#[derive(Debug, Clone)]
pub struct MacMapping {
    id: MappingId,
    settings: MacMappingConfig,
    config: MappingConfig,
    status: ActivationStatus,
}

impl MacMapping {
    /// Creates a mapping with an empty configuration.
    pub fn new(id: impl Into<MappingId>) -> Self {
        Self::with_settings(id, MacMappingConfig::default())
    }

    pub fn with_settings(id: impl Into<MappingId>, settings: MacMappingConfig) -> Self {
        Self {
            id: id.into(),
            settings,
            config: MappingConfig::new(),
            status: ActivationStatus::new(),
        }
    }

    pub fn id(&self) -> &MappingId {
        &self.id
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn status(&self) -> &ActivationStatus {
        &self.status
    }

    /// Updates both host sets and drops the bindings the update unmaps.
    ///
    /// Networks drained by the update are pushed onto `released`.
    pub fn update_config(
        &mut self,
        op: Option<UpdateOperation>,
        allowed: Option<&[Option<HostDesc>]>,
        denied: Option<&[Option<HostDesc>]>,
        released: &mut Vec<PortVlan>,
    ) -> Result<Option<ConfigChange>> {
        let result = self.config.update(op, allowed, denied);
        self.audit_update(op, None, &result);

        if let Ok(Some(change)) = &result {
            self.apply_change(change, released);
        }
        result
    }

    /// Updates one host set and drops the bindings the update unmaps.
    pub fn update_acl(
        &mut self,
        op: Option<UpdateOperation>,
        acl: AclType,
        hosts: Option<&[Option<HostDesc>]>,
        released: &mut Vec<PortVlan>,
    ) -> Result<Option<ConfigChange>> {
        let result = self.config.update_acl(op, acl, hosts);
        self.audit_update(op, Some(acl), &result);

        if let Ok(Some(change)) = &result {
            self.apply_change(change, released);
        }
        result
    }

    /// Binds a host learned on `port` if the configuration maps it.
    ///
    /// Returns `Ok(None)` for hosts that are not mapped and for hosts
    /// already bound to `port`.
    pub fn learn(&mut self, host: HostKey, port: SwitchPort) -> Result<Option<Activation>> {
        if !self.config.accepts(&host) {
            debug!("{}: {}: not mapped, ignored", self.id, host);
            return Ok(None);
        }
        self.status.activate(&self.id, host, port)
    }

    /// Unbinds one host, e.g. when its entry aged out.
    pub fn forget(&mut self, host: &HostKey, released: &mut Vec<PortVlan>) -> Option<SwitchPort> {
        self.status.inactivate_host(host, released)
    }

    /// Unbinds every host whose port is selected by `filter`.
    pub fn port_down(
        &mut self,
        filter: &dyn PortFilter,
        released: &mut Vec<PortVlan>,
    ) -> BTreeMap<HostKey, SwitchPort> {
        let removed = self.status.inactivate_ports(filter, released);
        if !removed.is_empty() {
            info!("{}: {} hosts inactivated by port down", self.id, removed.len());
            self.audit(
                AuditRecord::new(AuditCategory::NetworkConfig, self.id.as_str(), "port_down")
                    .with_details(serde_json::json!({
                        "hosts": removed.len(),
                        "released": released.len(),
                    })),
            );
        }
        removed
    }

    /// Persists the status table if it changed since the last commit.
    pub async fn commit(&mut self, store: &dyn MappingStore) -> StoreResult<bool> {
        self.status.submit(store, &self.id).await
    }

    /// Replaces the status table with the snapshot stored for this mapping.
    ///
    /// Restored bindings the current configuration no longer maps are
    /// dropped. Returns the number of bindings kept.
    pub async fn restore(&mut self, store: &dyn MappingStore) -> StoreResult<usize> {
        self.status = ActivationStatus::load(store, &self.id).await?;

        let mut released = Vec::new();
        let dropped = self.purge_unmapped(&mut released);
        if dropped > 0 {
            warn!("{}: dropped {} restored hosts no longer mapped", self.id, dropped);
        }

        self.audit(
            AuditRecord::new(AuditCategory::SystemLifecycle, self.id.as_str(), "restore")
                .with_details(serde_json::json!({
                    "hosts": self.status.len(),
                    "dropped": dropped,
                })),
        );
        Ok(self.status.len())
    }

    fn apply_change(&mut self, change: &ConfigChange, released: &mut Vec<PortVlan>) {
        if change.skip_purge() {
            debug!("{}: single host set changed", self.id);
        }

        if change.is_removing() {
            let removed = self.status.clear(released);
            info!("{}: configuration removed, {} hosts inactivated", self.id, removed.len());
            self.audit(
                AuditRecord::new(AuditCategory::ResourceDelete, self.id.as_str(), "remove")
                    .with_details(serde_json::json!({ "hosts": removed.len() })),
            );
            return;
        }

        let unmapped = self.status.inactivate_unmapped(
            &self.config.concrete_allowed(),
            &change.unmapped_vlans(),
            released,
        );

        // Hosts removed from the allowed set may still be mapped by a wildcard.
        let mut stale: Vec<HostKey> = change
            .revoked_hosts()
            .into_iter()
            .filter(|host| !self.config.accepts(host))
            .collect();

        // An explicit entry pins its MAC address to one VLAN.
        stale.extend(
            change
                .allow_added()
                .iter()
                .filter_map(|host| {
                    let mac = host.mac()?;
                    let bound = self.status.port_vlan(&mac)?;
                    (bound.vlan != host.vlan()).then(|| HostKey::new(mac, bound.vlan))
                }),
        );

        let mut revoked = 0;
        for host in &stale {
            if self.status.inactivate_host(host, released).is_some() {
                revoked += 1;
            }
        }

        let count = unmapped.len() + revoked;
        if count > 0 {
            info!("{}: {} hosts inactivated by configuration change", self.id, count);
        }
    }

    /// Unbinds every host the configuration no longer maps.
    fn purge_unmapped(&mut self, released: &mut Vec<PortVlan>) -> usize {
        let stale: Vec<HostKey> = self
            .status
            .bindings()
            .filter(|(host, _)| !self.config.accepts(host))
            .map(|(host, _)| *host)
            .collect();

        for host in &stale {
            self.status.inactivate_host(host, released);
        }
        stale.len()
    }

    fn audit_update(
        &self,
        op: Option<UpdateOperation>,
        acl: Option<AclType>,
        result: &Result<Option<ConfigChange>>,
    ) {
        let op = op.unwrap_or_default();
        let action = match acl {
            Some(acl) => format!("{} {} hosts", op, acl),
            None => format!("{} hosts", op),
        };
        let record = AuditRecord::new(AuditCategory::ConfigurationChange, self.id.as_str(), action);

        let record = match result {
            Ok(Some(change)) => record.with_details(serde_json::json!({
                "allow_added": change.allow_added().len(),
                "allow_removed": change.allow_removed().len(),
                "deny_added": change.deny_added().len(),
                "deny_removed": change.deny_removed().len(),
                "removing": change.is_removing(),
            })),
            Ok(None) => return,
            Err(e) => record.with_error(e.to_string()),
        };
        self.audit(record);
    }

    fn audit(&self, record: AuditRecord) {
        if self.settings.audit {
            crate::audit_log!(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MacMapError;
    use crate::filter::SwitchFilter;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use vbridge_types::{MacAddress, VlanId};

    fn mac(value: u64) -> MacAddress {
        MacAddress::from_u64(value).unwrap()
    }

    fn host(value: u64, vlan: u16) -> HostKey {
        HostKey::new(mac(value), VlanId::new(vlan).unwrap())
    }

    fn port(switch: u64, number: u32) -> SwitchPort {
        SwitchPort::new(switch, number)
    }

    fn wildcard(vlan: u16) -> Option<HostDesc> {
        Some(HostDesc::any(vlan))
    }

    fn desc(value: u64, vlan: u16) -> Option<HostDesc> {
        Some(HostDesc::new(mac(value), vlan))
    }

    #[test]
    fn test_mapping_id() {
        let id = MappingId::new("vtn1/vbr1");
        assert_eq!(id.as_str(), "vtn1/vbr1");
        assert_eq!(id.to_string(), "vtn1/vbr1");
        assert_eq!(MappingId::from(String::from("vtn1/vbr1")), id);
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""vtn1/vbr1""#);
    }

    #[test]
    fn test_learn_requires_mapping() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        assert_eq!(mapping.learn(host(1, 10), port(1, 1)).unwrap(), None);

        mapping
            .update_config(Some(UpdateOperation::Add), Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        assert!(mapping.learn(host(1, 10), port(1, 1)).unwrap().is_some());
        assert_eq!(mapping.learn(host(2, 20), port(1, 1)).unwrap(), None);
        assert_eq!(mapping.status().len(), 1);
    }

    #[test]
    fn test_learn_ignores_non_unicast() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();

        let vlan10 = VlanId::new(10).unwrap();
        let broadcast = HostKey::new(MacAddress::BROADCAST, vlan10);
        assert_eq!(mapping.learn(broadcast, port(1, 1)).unwrap(), None);
        assert_eq!(mapping.learn(host(0x0100_5e00_0001, 10), port(1, 1)).unwrap(), None);
        assert!(!mapping.status().has_mapping());
        assert_eq!(mapping.status().networks(), None);
    }

    #[test]
    fn test_revoked_host_kept_by_wildcard() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(
                None,
                Some(&[wildcard(10), desc(1, 10), desc(2, 20)]),
                None,
                &mut Vec::new(),
            )
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        mapping.learn(host(2, 20), port(1, 1)).unwrap();

        let mut released = Vec::new();
        let change = mapping
            .update_acl(
                Some(UpdateOperation::Remove),
                AclType::Allow,
                Some(&[desc(1, 10), desc(2, 20)]),
                &mut released,
            )
            .unwrap()
            .unwrap();
        assert_eq!(change.revoked_hosts(), BTreeSet::from([host(1, 10), host(2, 20)]));

        // Still mapped by the VLAN 10 wildcard.
        assert_eq!(mapping.status().port(&host(1, 10)), Some(port(1, 1)));
        assert_eq!(mapping.status().port(&host(2, 20)), None);
        assert_eq!(
            released,
            vec![PortVlan::new(port(1, 1), VlanId::new(20).unwrap())]
        );
    }

    #[test]
    fn test_learn_duplicate_mac() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10), wildcard(20)]), None, &mut Vec::new())
            .unwrap();

        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        let err = mapping.learn(host(1, 20), port(1, 1)).unwrap_err();
        assert!(matches!(err, MacMapError::DuplicateHost { .. }));
    }

    #[test]
    fn test_deny_inactivates_host() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        mapping.learn(host(2, 10), port(1, 2)).unwrap();

        let mut released = Vec::new();
        let change = mapping
            .update_acl(
                Some(UpdateOperation::Add),
                AclType::Deny,
                Some(&[desc(1, 10)]),
                &mut released,
            )
            .unwrap()
            .unwrap();
        assert!(change.skip_purge());
        assert_eq!(mapping.status().port(&host(1, 10)), None);
        assert_eq!(mapping.status().port(&host(2, 10)), Some(port(1, 2)));
        assert_eq!(
            released,
            vec![PortVlan::new(port(1, 1), VlanId::new(10).unwrap())]
        );
    }

    #[test]
    fn test_wildcard_removal_spares_explicit_hosts() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10), desc(2, 10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        mapping.learn(host(2, 10), port(1, 1)).unwrap();

        mapping
            .update_acl(
                Some(UpdateOperation::Remove),
                AclType::Allow,
                Some(&[wildcard(10)]),
                &mut Vec::new(),
            )
            .unwrap();
        assert_eq!(
            mapping.status().bindings().map(|(h, _)| *h).collect::<BTreeSet<_>>(),
            BTreeSet::from([host(2, 10)])
        );
    }

    #[test]
    fn test_explicit_entry_moves_mac() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();

        // Pinning the MAC address to VLAN 20 unmaps it on VLAN 10.
        mapping
            .update_acl(
                Some(UpdateOperation::Add),
                AclType::Allow,
                Some(&[desc(1, 20)]),
                &mut Vec::new(),
            )
            .unwrap();
        assert!(!mapping.status().has_mapping());
        assert!(mapping.learn(host(1, 20), port(1, 1)).unwrap().is_some());
    }

    #[test]
    fn test_removing_clears_status() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();

        let mut released = Vec::new();
        let change = mapping
            .update_config(None, None, None, &mut released)
            .unwrap()
            .unwrap();
        assert!(change.is_removing());
        assert!(!mapping.status().has_mapping());
        assert_eq!(released.len(), 1);
    }

    #[test]
    fn test_invalid_update_keeps_bindings() {
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();

        let err = mapping
            .update_config(None, Some(&[None]), None, &mut Vec::new())
            .unwrap_err();
        assert!(err.is_invalid_host());
        assert_eq!(mapping.status().len(), 1);
        assert!(mapping.config().allowed().contains(&HostKey::wildcard(VlanId::new(10).unwrap())));
    }

    #[test]
    fn test_port_down() {
        let mut mapping =
            MacMapping::with_settings("vtn1/vbr1", MacMappingConfig::default().with_audit(false));
        mapping
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        mapping.learn(host(2, 10), port(2, 1)).unwrap();

        let mut released = Vec::new();
        let removed = mapping.port_down(&SwitchFilter(2), &mut released);
        assert_eq!(removed, BTreeMap::from([(host(2, 10), port(2, 1))]));
        assert_eq!(mapping.status().len(), 1);

        let mut released = Vec::new();
        assert_eq!(mapping.forget(&host(1, 10), &mut released), Some(port(1, 1)));
        assert_eq!(released.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_and_restore() {
        let store = MemoryStore::new();
        let mut mapping = MacMapping::new("vtn1/vbr1");
        mapping
            .update_config(None, Some(&[wildcard(10), wildcard(20)]), None, &mut Vec::new())
            .unwrap();
        mapping.learn(host(1, 10), port(1, 1)).unwrap();
        mapping.learn(host(2, 20), port(1, 1)).unwrap();

        assert!(mapping.commit(&store).await.unwrap());
        assert!(!mapping.commit(&store).await.unwrap());
        assert_eq!(store.writes(), 1);

        // A restarted mapping that only maps VLAN 10 drops the VLAN 20 host.
        let mut restarted = MacMapping::new("vtn1/vbr1");
        restarted
            .update_config(None, Some(&[wildcard(10)]), None, &mut Vec::new())
            .unwrap();
        assert_eq!(restarted.restore(&store).await.unwrap(), 1);
        assert_eq!(restarted.status().port(&host(1, 10)), Some(port(1, 1)));

        assert!(restarted.commit(&store).await.unwrap());
        assert_eq!(store.get(mapping.id()).await.map(|s| s.hosts.len()), Some(1));
    }
}
