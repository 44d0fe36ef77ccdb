//! Configuration for namespaced database handles

use nskv_core::StoreConfig;

/// Environment variable holding the comma-separated store endpoint list.
pub const ENDPOINTS_ENV: &str = "NSKV_STORE_ENDPOINTS";

/// How the exclusive upper end of a namespace is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespaceBound {
    /// `prefix || "~"`. Logical keys starting with a byte above `~` fall
    /// outside iteration.
    #[default]
    Sentinel,
    /// The smallest key greater than every key carrying the prefix.
    PrefixSuccessor,
}

/// Handle configuration
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Store to connect to when the handle builds its own client
    pub store: StoreConfig,
    /// Claim the instance's coordination marker on open and fail if it is taken
    pub exclusive: bool,
    pub namespace_bound: NamespaceBound,
}

impl DbConfig {
    /// Defaults, with the store endpoints taken from [`ENDPOINTS_ENV`].
    ///
    /// An unset or blank variable leaves the endpoint list empty, so connecting
    /// fails with `NoEndpoints`.
    pub fn from_env() -> Self {
        let endpoints = std::env::var(ENDPOINTS_ENV)
            .map(|raw| parse_endpoints(&raw))
            .unwrap_or_default();
        Self {
            store: StoreConfig { endpoints, ..StoreConfig::default() },
            ..Self::default()
        }
    }
}

fn parse_endpoints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert!(!config.exclusive);
        assert_eq!(config.namespace_bound, NamespaceBound::Sentinel);
        assert_eq!(config.store.endpoints, vec![nskv_core::MEMORY_ENDPOINT.to_string()]);
    }

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            parse_endpoints(" pd-1:2379, pd-2:2379 ,,"),
            vec!["pd-1:2379".to_string(), "pd-2:2379".to_string()]
        );
        assert!(parse_endpoints("").is_empty());
        assert!(parse_endpoints(" , ").is_empty());
    }
}
