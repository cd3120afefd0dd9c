//! Network registry: maps a requested network id to the database that holds
//! its indexed data.

use chaingate_error::{ChainGateError, ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Virtual-machine family a network belongs to. Routes and SQL templates are
/// declared per chain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Evm,
    Svm,
    Tvm,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Svm => "svm",
            Self::Tvm => "tvm",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm" => Ok(Self::Evm),
            "svm" => Ok(Self::Svm),
            "tvm" => Ok(Self::Tvm),
            other => Err(format!("Unknown chain type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub id: String,
    pub chain: ChainType,
    pub database: String,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkConfig>,
}

impl NetworkRegistry {
    pub fn from_configs(configs: &[NetworkConfig]) -> Result<Self, ChainGateError> {
        let mut networks = BTreeMap::new();
        for config in configs {
            if networks.insert(config.id.clone(), config.clone()).is_some() {
                return Err(ChainGateError::new(
                    ErrorCode::InvalidConfig,
                    format!("Network '{}' is declared more than once", config.id),
                ));
            }
        }
        Ok(Self { networks })
    }

    /// Resolve the database for `network`, which must belong to `chain`.
    pub fn resolve(&self, network: &str, chain: ChainType) -> Result<&str, ChainGateError> {
        match self.networks.get(network) {
            Some(config) if config.chain == chain => Ok(config.database.as_str()),
            _ => Err(ChainGateError::new(
                ErrorCode::NetworkNotFound,
                format!("Network '{}' not found for {} endpoints", network, chain),
            )
            .with_context(ErrorContext::Network {
                network: network.to_string(),
                available_networks: self.ids_for(chain),
            })),
        }
    }

    pub fn ids_for(&self, chain: ChainType) -> Vec<String> {
        self.networks
            .values()
            .filter(|n| n.chain == chain)
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
