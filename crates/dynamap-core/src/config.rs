//! Engine configuration.
//!
//! Provides [`EnhancedConfig`]. Values can be loaded from environment
//! variables via [`EnhancedConfig::from_env`] or set with the builder.

use std::env;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Limits and defaults applied by the typed client.
///
/// # Examples
///
/// ```
/// use dynamap_core::config::EnhancedConfig;
///
/// let config = EnhancedConfig::default();
/// assert_eq!(config.max_batch_write_items, 25);
/// assert!(!config.consistent_reads);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedConfig {
    /// Maximum number of keys in one batch get.
    #[builder(default = 100)]
    pub max_batch_get_items: usize,

    /// Maximum number of puts and deletes in one batch write.
    #[builder(default = 25)]
    pub max_batch_write_items: usize,

    /// Maximum number of sub-requests in one transaction.
    #[builder(default = 100)]
    pub max_transact_items: usize,

    /// Whether single-item and batch reads default to strongly consistent.
    #[builder(default = false)]
    pub consistent_reads: bool,
}

impl Default for EnhancedConfig {
    fn default() -> Self {
        Self {
            max_batch_get_items: 100,
            max_batch_write_items: 25,
            max_transact_items: 100,
            consistent_reads: false,
        }
    }
}

impl EnhancedConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAMAP_MAX_BATCH_GET_ITEMS` | `100` |
    /// | `DYNAMAP_MAX_BATCH_WRITE_ITEMS` | `25` |
    /// | `DYNAMAP_MAX_TRANSACT_ITEMS` | `100` |
    /// | `DYNAMAP_CONSISTENT_READS` | `false` |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_batch_get_items: env_usize("DYNAMAP_MAX_BATCH_GET_ITEMS", defaults.max_batch_get_items),
            max_batch_write_items: env_usize(
                "DYNAMAP_MAX_BATCH_WRITE_ITEMS",
                defaults.max_batch_write_items,
            ),
            max_transact_items: env_usize("DYNAMAP_MAX_TRANSACT_ITEMS", defaults.max_transact_items),
            consistent_reads: env_bool("DYNAMAP_CONSISTENT_READS", defaults.consistent_reads),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
