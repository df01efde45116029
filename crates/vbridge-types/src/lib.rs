//! Common types for the virtual bridge control plane.
//!
//! This crate provides type-safe representations of the physical network
//! primitives a virtual bridge maps hosts onto:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers (0 = untagged)
//! - [`SwitchPort`]: A physical port on a managed switch

mod mac;
mod port;
mod vlan;

pub use mac::MacAddress;
pub use port::SwitchPort;
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("MAC address out of range: {0:#x}")]
    MacAddressOutOfRange(u64),

    #[error("invalid VLAN ID: {0} (must be 0-4095)")]
    InvalidVlanId(u16),

    #[error("invalid VLAN ID format: {0}")]
    InvalidVlanFormat(String),

    #[error("invalid switch port: {0}")]
    InvalidSwitchPort(String),
}
