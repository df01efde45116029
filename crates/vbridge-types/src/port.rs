//! Physical switch port identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physical port on a managed switch.
///
/// Identified by the switch's datapath ID and the port number on that
/// switch. Formats as `"<switch>:<port>"`.
///
/// # Examples
///
/// ```
/// use vbridge_types::SwitchPort;
///
/// let port: SwitchPort = "1:3".parse().unwrap();
/// assert_eq!(port.switch_id(), 1);
/// assert_eq!(port.port_number(), 3);
/// assert_eq!(port.to_string(), "1:3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SwitchPort {
    switch_id: u64,
    port_number: u32,
}

impl SwitchPort {
    /// Creates a new switch port identifier.
    pub const fn new(switch_id: u64, port_number: u32) -> Self {
        Self {
            switch_id,
            port_number,
        }
    }

    /// Returns the datapath ID of the switch owning this port.
    pub const fn switch_id(&self) -> u64 {
        self.switch_id
    }

    /// Returns the port number on the switch.
    pub const fn port_number(&self) -> u32 {
        self.port_number
    }

    /// Returns true if this port belongs to the given switch.
    pub const fn is_on_switch(&self, switch_id: u64) -> bool {
        self.switch_id == switch_id
    }
}

impl fmt::Display for SwitchPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.switch_id, self.port_number)
    }
}

impl FromStr for SwitchPort {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (switch, port) = s
            .split_once(':')
            .ok_or_else(|| ParseError::InvalidSwitchPort(s.to_string()))?;

        let switch_id = switch
            .parse()
            .map_err(|_| ParseError::InvalidSwitchPort(s.to_string()))?;
        let port_number = port
            .parse()
            .map_err(|_| ParseError::InvalidSwitchPort(s.to_string()))?;

        Ok(SwitchPort::new(switch_id, port_number))
    }
}

impl TryFrom<String> for SwitchPort {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SwitchPort> for String {
    fn from(port: SwitchPort) -> String {
        port.to_string()
    }
}
