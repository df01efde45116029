//! MAC mapping engine for virtual bridges.
//!
//! A MAC mapping maps hosts, identified by MAC address and VLAN, onto a
//! virtual bridge. This crate provides the two halves of that model and the
//! owner that keeps them consistent:
//!
//! - [`MappingConfig`]: The administrator's allowed and denied host sets
//! - [`ActivationStatus`]: Hosts currently bound to switch ports
//! - [`MacMapping`]: Applies configuration changes to the status table
//! - [`MappingStore`]: Durable store for status snapshots
//!
//! # Example
//!
//! ```
//! use vbridge_macmap::{HostDesc, HostKey, MacMapping};
//! use vbridge_macmap::vbridge_types::SwitchPort;
//!
//! let mut mapping = MacMapping::new("vtn1/vbr1");
//! mapping
//!     .update_config(None, Some(&[Some(HostDesc::any(10))]), None, &mut Vec::new())
//!     .unwrap();
//!
//! let host: HostKey = "00:00:00:00:00:01@10".parse().unwrap();
//! let activation = mapping.learn(host, SwitchPort::new(1, 1)).unwrap().unwrap();
//! assert!(activation.first);
//! ```

pub mod audit;
mod change;
mod config;
mod error;
mod filter;
mod host;
mod mapping;
mod refcount;
mod status;
mod store;

pub use change::ConfigChange;
pub use config::{AclType, MappingConfig, UpdateOperation};
pub use error::{MacMapError, Result};
pub use filter::{ExactPortFilter, PortFilter, SwitchFilter};
pub use host::{HostDesc, HostKey, PortVlan};
pub use mapping::{MacMapping, MacMappingConfig, MappingId};
pub use refcount::{RefCountError, RefCountMap};
pub use status::{Activation, ActivationStatus};
pub use store::{HostBinding, MappingStore, MemoryStore, StatusSnapshot, StoreError, StoreResult};
#[cfg(feature = "redis")]
pub use store::{RedisStore, RedisStoreConfig};

pub use vbridge_types;
