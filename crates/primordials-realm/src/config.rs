//! Realm configuration, loadable from a `[realm]` TOML table.

use std::path::Path;

use serde::Deserialize;

use crate::error::{VmError, VmResult};

/// Configuration for creating a new [`Realm`](crate::Realm).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    /// Maximum nesting of native calls before `RangeError`
    pub max_native_depth: usize,
    /// Upper bound on jobs run by one `run_jobs` drain
    pub max_jobs_per_drain: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            max_native_depth: 256,
            max_jobs_per_drain: 1_000_000,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    realm: RealmConfig,
}

impl RealmConfig {
    /// Parse the `[realm]` table of a TOML document. Missing keys keep defaults.
    pub fn from_toml(content: &str) -> VmResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| VmError::internal(format!("Failed to parse realm config: {e}")))?;
        Ok(file.realm)
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> VmResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            VmError::internal(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealmConfig::default();
        assert_eq!(config.max_native_depth, 256);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = RealmConfig::from_toml(
            r#"
            [realm]
            max_native_depth = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.max_native_depth, 64);
        assert_eq!(config.max_jobs_per_drain, 1_000_000);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(RealmConfig::from_toml("").unwrap(), RealmConfig::default());
    }

    #[test]
    fn test_invalid_document() {
        assert!(RealmConfig::from_toml("[realm]\nmax_native_depth = \"deep\"").is_err());
    }
}
