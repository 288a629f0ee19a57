//! Engine configuration.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use vigil_storage::StoreConfig;

/// Network the index database is bound to.
///
/// The selected magic is written under the `O` tag on first open and must
/// match on every subsequent open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// The magic value stored under the `O` tag.
    pub fn magic(&self) -> u32 {
        match self {
            Network::Mainnet => 0x56474c4d,
            Network::Testnet => 0x56474c54,
            Network::Regtest => 0x56474c52,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

/// Complete index-engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Network the database is bound to.
    #[serde(default)]
    pub network: Network,
    /// Keep the database in memory instead of on disk.
    #[serde(default)]
    pub memory: bool,
    /// Filesystem root; the database lives at `prefix/index` unless
    /// `location` overrides it.
    #[serde(default = "default_prefix")]
    pub prefix: PathBuf,
    /// Explicit database location, overriding `prefix/index`.
    #[serde(default)]
    pub location: Option<PathBuf>,
    /// File-descriptor budget for the database.
    #[serde(default = "default_max_files")]
    pub max_files: u32,
    /// Block cache size in bytes.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Whether to compress data blocks.
    #[serde(default = "default_compression")]
    pub compression: bool,
    /// Ordered list of indexers to load; unknown identifiers are fatal.
    #[serde(default = "default_indexers")]
    pub indexers: Vec<String>,
}

fn default_prefix() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_files() -> u32 {
    64
}

fn default_cache_size() -> usize {
    16 * 1024 * 1024
}

fn default_compression() -> bool {
    true
}

fn default_indexers() -> Vec<String> {
    vec!["tx".into(), "addr".into()]
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            memory: false,
            prefix: default_prefix(),
            location: None,
            max_files: default_max_files(),
            cache_size: default_cache_size(),
            compression: default_compression(),
            indexers: default_indexers(),
        }
    }
}

impl IndexConfig {
    /// A memory-backed configuration, as used by tests.
    pub fn in_memory() -> Self {
        Self {
            memory: true,
            ..Self::default()
        }
    }

    /// The on-disk database location.
    pub fn database_path(&self) -> PathBuf {
        match &self.location {
            Some(location) => location.clone(),
            None => self.prefix.join("index"),
        }
    }

    /// Options for the underlying store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_files: self.max_files,
            cache_size: self.cache_size,
            compression: self.compression,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.network, Network::Mainnet);
        assert!(!config.memory);
        assert_eq!(config.max_files, 64);
        assert_eq!(config.cache_size, 16 * 1024 * 1024);
        assert!(config.compression);
        assert_eq!(config.indexers, vec!["tx".to_string(), "addr".to_string()]);
        assert_eq!(config.database_path(), PathBuf::from("./index"));
    }

    #[test]
    fn test_location_overrides_prefix() {
        let config = IndexConfig {
            prefix: PathBuf::from("/data"),
            location: Some(PathBuf::from("/elsewhere/idx")),
            ..IndexConfig::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/elsewhere/idx"));
    }

    #[test]
    fn test_network_magics_distinct() {
        let magics = [
            Network::Mainnet.magic(),
            Network::Testnet.magic(),
            Network::Regtest.magic(),
        ];
        assert_ne!(magics[0], magics[1]);
        assert_ne!(magics[1], magics[2]);
        assert_ne!(magics[0], magics[2]);
        assert_eq!(Network::Testnet.to_string(), "testnet");
    }
}
