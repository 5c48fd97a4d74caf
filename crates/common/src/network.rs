//! Network identity shared by every ingestion component.
//!
//! [`CommonProperties`] is constructed once when the process starts and then
//! handed by reference to every component that needs the shard, realm or
//! network name. It is never mutated afterwards.
//!
//! # Example
//!
//! ```rust
//! use mirror_common::{CommonProperties, NetworkKind};
//!
//! let props = CommonProperties::new(NetworkKind::Testnet, 0, 0).unwrap();
//! assert_eq!(props.entity_id(3).unwrap().to_string(), "0.0.3");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::EntityId;

/// Which network the node ingests from.
///
/// The network only influences defaults (bucket names, whether consensus may
/// be relaxed); the ingestion algorithms are identical across networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// Production network.
    Mainnet,
    /// Public test network.
    #[default]
    Testnet,
    /// Preview network.
    Previewnet,
    /// Single-node demo or local development network.
    Demo,
    /// Any other privately run network.
    Other,
}

impl NetworkKind {
    /// Returns `true` for networks where running without signature consensus
    /// is acceptable.
    pub fn allows_single_node(&self) -> bool {
        matches!(self, NetworkKind::Demo | NetworkKind::Other)
    }

    /// Lowercase network name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Mainnet => "mainnet",
            NetworkKind::Testnet => "testnet",
            NetworkKind::Previewnet => "previewnet",
            NetworkKind::Demo => "demo",
            NetworkKind::Other => "other",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NetworkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkKind::Mainnet),
            "testnet" => Ok(NetworkKind::Testnet),
            "previewnet" => Ok(NetworkKind::Previewnet),
            "demo" => Ok(NetworkKind::Demo),
            "other" => Ok(NetworkKind::Other),
            other => Err(Error::Config(format!("unknown network: {}", other))),
        }
    }
}

/// Immutable network-wide properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonProperties {
    /// Network being mirrored.
    #[serde(default)]
    pub network: NetworkKind,
    /// Shard of the mirrored network.
    #[serde(default)]
    pub shard: i64,
    /// Realm of the mirrored network.
    #[serde(default)]
    pub realm: i64,
}

impl Default for CommonProperties {
    fn default() -> Self {
        Self {
            network: NetworkKind::default(),
            shard: 0,
            realm: 0,
        }
    }
}

impl CommonProperties {
    /// Creates validated properties.
    pub fn new(network: NetworkKind, shard: i64, realm: i64) -> Result<Self> {
        let props = Self {
            network,
            shard,
            realm,
        };
        props.validate()?;
        Ok(props)
    }

    /// Checks that shard and realm fit the entity id encoding.
    pub fn validate(&self) -> Result<()> {
        EntityId::new(self.shard, self.realm, 0)
            .map(|_| ())
            .map_err(|e| Error::Config(format!("invalid shard/realm: {}", e)))
    }

    /// Builds an entity id in this network's shard and realm.
    pub fn entity_id(&self, num: i64) -> Result<EntityId> {
        EntityId::new(self.shard, self.realm, num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_testnet_zero_zero() {
        let props = CommonProperties::default();
        assert_eq!(props.network, NetworkKind::Testnet);
        assert_eq!(props.entity_id(2).unwrap(), EntityId::new(0, 0, 2).unwrap());
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!("MAINNET".parse::<NetworkKind>().unwrap(), NetworkKind::Mainnet);
        assert_eq!(NetworkKind::Demo.as_str().parse::<NetworkKind>().unwrap(), NetworkKind::Demo);
        assert!("localnet".parse::<NetworkKind>().is_err());
    }

    #[test]
    fn test_invalid_shard_rejected() {
        assert!(CommonProperties::new(NetworkKind::Mainnet, -1, 0).is_err());
    }

    #[test]
    fn test_single_node_networks() {
        assert!(NetworkKind::Demo.allows_single_node());
        assert!(!NetworkKind::Mainnet.allows_single_node());
    }
}
