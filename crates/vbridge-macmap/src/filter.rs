//! Port filters used to select bindings for bulk inactivation.

use vbridge_types::{SwitchPort, VlanId};

/// Predicate over the physical network a host is bound to.
///
/// Supplied by the topology layer to express "every port on switch S" or
/// "exactly port P" without the status table knowing about inventory.
/// Closures of the form `Fn(&SwitchPort, VlanId) -> bool` are filters too.
pub trait PortFilter {
    /// Returns true if the binding on `port` in `vlan` is selected.
    fn accept(&self, port: &SwitchPort, vlan: VlanId) -> bool;
}

impl<F> PortFilter for F
where
    F: Fn(&SwitchPort, VlanId) -> bool,
{
    fn accept(&self, port: &SwitchPort, vlan: VlanId) -> bool {
        self(port, vlan)
    }
}

/// Selects every port on one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchFilter(pub u64);

impl PortFilter for SwitchFilter {
    fn accept(&self, port: &SwitchPort, _vlan: VlanId) -> bool {
        port.is_on_switch(self.0)
    }
}

/// Selects exactly one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactPortFilter(pub SwitchPort);

impl PortFilter for ExactPortFilter {
    fn accept(&self, port: &SwitchPort, _vlan: VlanId) -> bool {
        *port == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_filter() {
        let filter = SwitchFilter(1);
        assert!(filter.accept(&SwitchPort::new(1, 1), VlanId::UNTAGGED));
        assert!(filter.accept(&SwitchPort::new(1, 2), VlanId::UNTAGGED));
        assert!(!filter.accept(&SwitchPort::new(2, 1), VlanId::UNTAGGED));
    }

    #[test]
    fn test_exact_port_filter() {
        let filter = ExactPortFilter(SwitchPort::new(1, 1));
        assert!(filter.accept(&SwitchPort::new(1, 1), VlanId::UNTAGGED));
        assert!(!filter.accept(&SwitchPort::new(1, 2), VlanId::UNTAGGED));
    }

    #[test]
    fn test_closure_filter() {
        let vlan10 = VlanId::new(10).unwrap();
        let filter = |_: &SwitchPort, vlan: VlanId| vlan == vlan10;
        assert!(filter.accept(&SwitchPort::new(1, 1), vlan10));
        assert!(!filter.accept(&SwitchPort::new(1, 1), VlanId::UNTAGGED));
    }
}
