//! Named SQL templates, grouped by chain family.
//!
//! Templates live on disk as `<dir>/<chain>/<name>.sql` and are loaded once at
//! startup. Placeholders use the backend's `{name:Type}` binding syntax, so the
//! gateway never interpolates values into SQL text.

use chaingate_common::networks::ChainType;
use chaingate_error::{ChainGateError, ErrorCode, ErrorContext, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Joins multiple template fragments into one statement.
pub const FRAGMENT_SEPARATOR: &str = " UNION ALL ";

const TEMPLATE_EXTENSION: &str = "sql";

#[derive(Debug, Clone, Default)]
pub struct SqlRegistry {
    templates: HashMap<(ChainType, String), String>,
}

impl SqlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<chain>/<name>.sql` under `dir`. Directories that are not a
    /// known chain family are skipped.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new();

        let entries = std::fs::read_dir(dir).map_err(|e| {
            ChainGateError::new(
                ErrorCode::InvalidConfig,
                format!("Failed to read SQL directory {}: {}", dir.display(), e),
            )
        })?;

        for entry in entries {
            let chain_dir = entry?.path();
            if !chain_dir.is_dir() {
                continue;
            }
            let Some(chain) = chain_dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<ChainType>().ok())
            else {
                warn!("Skipping unknown chain directory {}", chain_dir.display());
                continue;
            };

            for file in std::fs::read_dir(&chain_dir)? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let sql = std::fs::read_to_string(&path)?;
                debug!(chain = %chain, name = %name, "Loaded SQL template");
                registry.insert(chain, name, sql);
            }
        }

        Ok(registry)
    }

    pub fn insert(&mut self, chain: ChainType, name: impl Into<String>, sql: impl Into<String>) {
        self.templates
            .insert((chain, name.into()), sql.into().trim().trim_end_matches(';').to_string());
    }

    pub fn get(&self, chain: ChainType, name: &str) -> Result<&str> {
        self.templates
            .get(&(chain, name.to_string()))
            .map(String::as_str)
            .ok_or_else(|| {
                ChainGateError::new(
                    ErrorCode::QueryNotFound,
                    format!("No SQL template '{}' for chain '{}'", name, chain),
                )
                .with_context(ErrorContext::Template {
                    chain: chain.to_string(),
                    query: name.to_string(),
                })
            })
    }

    /// Concatenate the named fragments, in order, into one statement.
    pub fn assemble(&self, chain: ChainType, names: &[String]) -> Result<String> {
        if names.is_empty() {
            return Err(ChainGateError::new(
                ErrorCode::QueryNotFound,
                "No SQL template names given",
            ));
        }
        let fragments = names
            .iter()
            .map(|name| self.get(chain, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(fragments.join(FRAGMENT_SEPARATOR))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_from_dir_loads_by_chain() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("evm")).unwrap();
        fs::create_dir(dir.path().join("svm")).unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("evm/balances.sql"), "SELECT 1;\n").unwrap();
        fs::write(dir.path().join("evm/README.md"), "ignored").unwrap();
        fs::write(dir.path().join("svm/transfers.sql"), "SELECT 2").unwrap();
        fs::write(dir.path().join("drafts/x.sql"), "SELECT 3").unwrap();

        let registry = SqlRegistry::from_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(ChainType::Evm, "balances").unwrap(), "SELECT 1");
        assert_eq!(registry.get(ChainType::Svm, "transfers").unwrap(), "SELECT 2");
        assert!(registry.get(ChainType::Svm, "balances").is_err());
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let err = SqlRegistry::from_dir("/nonexistent/chaingate-sql").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_assemble_preserves_order() {
        let mut registry = SqlRegistry::new();
        registry.insert(ChainType::Evm, "a", "SELECT 'a'");
        registry.insert(ChainType::Evm, "b", "SELECT 'b'");

        let sql = registry
            .assemble(ChainType::Evm, &["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(sql, "SELECT 'b' UNION ALL SELECT 'a'");
    }

    #[test]
    fn test_unknown_template_names_query() {
        let registry = SqlRegistry::new();
        let err = registry
            .assemble(ChainType::Tvm, &["transfers".to_string()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryNotFound);
        match err.context {
            Some(ErrorContext::Template { chain, query }) => {
                assert_eq!(chain, "tvm");
                assert_eq!(query, "transfers");
            }
            _ => panic!("Wrong context"),
        }
    }
}
