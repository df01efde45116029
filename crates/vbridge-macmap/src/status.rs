//! Activation status table.
//!
//! Tracks which hosts are currently bound to which switch port, counts the
//! hosts on each physical network, and remembers whether it changed since
//! the last persistence point.

use crate::error::{MacMapError, Result};
use crate::filter::PortFilter;
use crate::host::{HostKey, PortVlan};
use crate::mapping::MappingId;
use crate::refcount::RefCountMap;
use crate::store::{HostBinding, MappingStore, StatusSnapshot, StoreError, StoreResult};
use log::{debug, error, info, trace};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use vbridge_types::{MacAddress, SwitchPort, VlanId};

/// Outcome of an activation that changed the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// The table held no binding before this activation.
    pub first: bool,
    /// Port the host was bound to before, if it moved.
    pub previous_port: Option<SwitchPort>,
    /// Network whose last host left because of the move.
    pub released: Option<PortVlan>,
}

/// Runtime bindings of one MAC mapping.
///
/// A MAC address is bound on at most one VLAN at a time, and every network
/// with a bound host carries a reference count equal to the number of hosts
/// bound on it.
#[derive(Debug, Clone, Default)]
pub struct ActivationStatus {
    hosts: HashMap<HostKey, SwitchPort>,
    macs: HashMap<MacAddress, VlanId>,
    networks: RefCountMap<PortVlan>,
    dirty: bool,
    persisted: bool,
}

impl ActivationStatus {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `host` to `port`.
    ///
    /// Returns `Ok(None)` if the host is already bound to `port`. Moving a
    /// host to another port releases its old network.
    ///
    /// # Errors
    ///
    /// Fails with [`MacMapError::DuplicateHost`] if the MAC address is
    /// already bound on another VLAN, and with
    /// [`MacMapError::WildcardBinding`] for a wildcard host and with
    /// [`MacMapError::NonUnicastHost`] for a broadcast or multicast address.
    /// The table is unchanged on error.
    pub fn activate(
        &mut self,
        id: &MappingId,
        host: HostKey,
        port: SwitchPort,
    ) -> Result<Option<Activation>> {
        let Some(mac) = host.mac() else {
            return Err(MacMapError::WildcardBinding {
                mapping: id.clone(),
                host,
            });
        };
        if !mac.is_unicast() {
            return Err(MacMapError::NonUnicastHost {
                mapping: id.clone(),
                host,
            });
        }

        let previous = self.hosts.get(&host).copied();
        if previous == Some(port) {
            trace!("{}: {}: already activated on {}", id, host, port);
            return Ok(None);
        }
        if previous.is_none() {
            if let Some(existing) = self.duplicate(&host) {
                return Err(MacMapError::DuplicateHost {
                    mapping: id.clone(),
                    host,
                    existing,
                });
            }
        }

        let first = self.hosts.is_empty();
        self.hosts.insert(host, port);
        self.macs.insert(mac, host.vlan());
        self.networks.acquire(PortVlan::new(port, host.vlan()));
        let released = previous.and_then(|old| self.release(PortVlan::new(old, host.vlan())));
        self.dirty = true;

        match previous {
            Some(old) => info!("{}: {}: moved from {} to {}", id, host, old, port),
            None => info!("{}: {}: activated on {}", id, host, port),
        }

        Ok(Some(Activation {
            first,
            previous_port: previous,
            released,
        }))
    }

    /// Unbinds one host.
    ///
    /// Pushes the host's network onto `released` if this was its last host.
    /// Returns the port the host was bound to, or `None` if it was not bound.
    pub fn inactivate_host(
        &mut self,
        host: &HostKey,
        released: &mut Vec<PortVlan>,
    ) -> Option<SwitchPort> {
        let port = self.unbind(host)?;
        if let Some(nw) = self.release(PortVlan::new(port, host.vlan())) {
            released.push(nw);
        }
        self.dirty = true;
        debug!("{}: inactivated on {}", host, port);
        Some(port)
    }

    /// Unbinds every host on one network.
    ///
    /// Returns the removed hosts, or `None` if no host was bound on `nw`.
    pub fn inactivate_network(&mut self, nw: &PortVlan) -> Option<BTreeSet<HostKey>> {
        if !self.networks.contains(nw) {
            return None;
        }

        let hosts: BTreeSet<HostKey> = self
            .hosts
            .iter()
            .filter(|(host, port)| host.vlan() == nw.vlan && **port == nw.port)
            .map(|(host, _)| *host)
            .collect();
        for host in &hosts {
            self.unbind(host);
        }
        self.networks.remove(nw);
        self.dirty = true;

        debug!("{}: inactivated {} hosts", nw, hosts.len());
        Some(hosts)
    }

    /// Unbinds every host whose network is selected by `filter`.
    ///
    /// Drained networks are pushed onto `released`.
    pub fn inactivate_ports(
        &mut self,
        filter: &dyn PortFilter,
        released: &mut Vec<PortVlan>,
    ) -> BTreeMap<HostKey, SwitchPort> {
        let selected: BTreeMap<HostKey, SwitchPort> = self
            .hosts
            .iter()
            .filter(|(host, port)| filter.accept(port, host.vlan()))
            .map(|(host, port)| (*host, *port))
            .collect();

        self.remove_bindings(&selected, released);
        selected
    }

    /// Unbinds hosts on `unmapped_vlans` that are not in `allowed`.
    ///
    /// Used after wildcard entries were removed from the configuration.
    /// Drained networks are pushed onto `released`.
    pub fn inactivate_unmapped(
        &mut self,
        allowed: &BTreeSet<HostKey>,
        unmapped_vlans: &BTreeSet<VlanId>,
        released: &mut Vec<PortVlan>,
    ) -> BTreeMap<HostKey, SwitchPort> {
        if unmapped_vlans.is_empty() {
            return BTreeMap::new();
        }

        let selected: BTreeMap<HostKey, SwitchPort> = self
            .hosts
            .iter()
            .filter(|(host, _)| unmapped_vlans.contains(&host.vlan()) && !allowed.contains(*host))
            .map(|(host, port)| (*host, *port))
            .collect();

        self.remove_bindings(&selected, released);
        selected
    }

    /// Unbinds every host.
    pub fn clear(&mut self, released: &mut Vec<PortVlan>) -> BTreeMap<HostKey, SwitchPort> {
        self.inactivate_ports(&|_: &SwitchPort, _: VlanId| true, released)
    }

    /// Returns the port a host is bound to.
    pub fn port(&self, host: &HostKey) -> Option<SwitchPort> {
        self.hosts.get(host).copied()
    }

    /// Returns the network a MAC address is bound on.
    pub fn port_vlan(&self, mac: &MacAddress) -> Option<PortVlan> {
        let vlan = *self.macs.get(mac)?;
        let port = self.hosts.get(&HostKey::new(*mac, vlan))?;
        Some(PortVlan::new(*port, vlan))
    }

    /// Returns the bound host sharing the MAC address of `host` on another
    /// VLAN.
    pub fn duplicate(&self, host: &HostKey) -> Option<HostKey> {
        let mac = host.mac()?;
        self.macs
            .get(&mac)
            .filter(|vlan| **vlan != host.vlan())
            .map(|vlan| HostKey::new(mac, *vlan))
    }

    /// Returns true if at least one host is bound.
    pub fn has_mapping(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Returns true if at least one host is bound on `nw`.
    pub fn has_network(&self, nw: &PortVlan) -> bool {
        self.networks.contains(nw)
    }

    /// Number of hosts bound on `nw`.
    pub fn network_refs(&self, nw: &PortVlan) -> Option<u32> {
        self.networks.count(nw)
    }

    /// Returns every network with a bound host, or `None` if there is none.
    pub fn networks(&self) -> Option<BTreeSet<PortVlan>> {
        if self.networks.is_empty() {
            return None;
        }
        Some(self.networks.keys().copied().collect())
    }

    /// Number of bound hosts.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if no host is bound.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterates over bindings in no particular order.
    pub fn bindings(&self) -> impl Iterator<Item = (&HostKey, &SwitchPort)> {
        self.hosts.iter()
    }

    /// Returns whether the table changed since the last call, and clears
    /// the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Returns the persisted form of the table, or `None` if it is empty.
    pub fn snapshot(&self) -> Option<StatusSnapshot> {
        if self.hosts.is_empty() {
            return None;
        }

        let hosts = self
            .hosts
            .iter()
            .filter_map(|(host, port)| {
                host.mac().map(|mac| HostBinding {
                    mac,
                    vlan: host.vlan(),
                    port: *port,
                })
            })
            .collect();
        Some(StatusSnapshot::new(hosts))
    }

    /// Persists the table if it changed.
    ///
    /// Writes a snapshot of a non-empty table, and deletes the stored
    /// snapshot of an emptied one. Returns true if the store was called.
    /// A failed store call leaves the table dirty.
    pub async fn submit(&mut self, store: &dyn MappingStore, id: &MappingId) -> StoreResult<bool> {
        if !self.take_dirty() {
            return Ok(false);
        }

        let result = match self.snapshot() {
            Some(snapshot) => store.write(id, &snapshot).await.map(|_| true),
            None if self.persisted => store.delete(id).await.map(|_| false),
            None => {
                trace!("{}: nothing to persist", id);
                return Ok(false);
            }
        };

        match result {
            Ok(persisted) => {
                self.persisted = persisted;
                debug!("{}: submitted {} host bindings", id, self.hosts.len());
                Ok(true)
            }
            Err(e) => {
                self.dirty = true;
                error!("{}: failed to submit activation status: {}", id, e);
                Err(e)
            }
        }
    }

    /// Rebuilds a table from the snapshot stored for `id`.
    ///
    /// Returns an empty table if no snapshot exists.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::InvalidSnapshot`] if the snapshot binds a
    /// MAC address on two VLANs, binds a host twice, or binds a broadcast or
    /// multicast address.
    pub async fn load(store: &dyn MappingStore, id: &MappingId) -> StoreResult<Self> {
        let mut status = Self::new();
        let Some(snapshot) = store.read(id).await? else {
            return Ok(status);
        };

        for binding in &snapshot.hosts {
            let host = binding.host();
            if let Some(port) = status.port(&host) {
                return Err(StoreError::InvalidSnapshot {
                    mapping: id.clone(),
                    reason: format!("{} bound to both {} and {}", host, port, binding.port),
                });
            }
            status
                .activate(id, host, binding.port)
                .map_err(|e| StoreError::InvalidSnapshot {
                    mapping: id.clone(),
                    reason: e.to_string(),
                })?;
        }

        status.dirty = false;
        status.persisted = true;
        info!("{}: restored {} host bindings", id, status.len());
        Ok(status)
    }

    fn unbind(&mut self, host: &HostKey) -> Option<SwitchPort> {
        let port = self.hosts.remove(host)?;
        if let Some(mac) = host.mac() {
            self.macs.remove(&mac);
        }
        Some(port)
    }

    /// Drops one reference to `nw`, returning it if it drained.
    fn release(&mut self, nw: PortVlan) -> Option<PortVlan> {
        match self.networks.release(&nw) {
            Ok(0) => Some(nw),
            Ok(_) => None,
            Err(e) => {
                error!("{}: network reference lost: {}", nw, e);
                None
            }
        }
    }

    fn remove_bindings(
        &mut self,
        selected: &BTreeMap<HostKey, SwitchPort>,
        released: &mut Vec<PortVlan>,
    ) {
        for (host, port) in selected {
            self.unbind(host);
            if let Some(nw) = self.release(PortVlan::new(*port, host.vlan())) {
                released.push(nw);
            }
        }
        if !selected.is_empty() {
            self.dirty = true;
            debug!("inactivated {} hosts", selected.len());
        }
    }
}
