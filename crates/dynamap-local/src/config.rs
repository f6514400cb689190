//! Local store configuration.

use std::env;

/// Settings of a [`LocalClient`](crate::LocalClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Reject items and expression values holding malformed numbers or
    /// empty or duplicate sets.
    pub strict_validation: bool,
}

impl LocalConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAMAP_LOCAL_STRICT_VALIDATION` | `true` |
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            strict_validation: env_bool("DYNAMAP_LOCAL_STRICT_VALIDATION", true),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            strict_validation: true,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_validate_strictly_by_default() {
        let config = LocalConfig::default();
        assert!(config.strict_validation);
        assert_eq!(config, LocalConfig { strict_validation: true });
    }

    #[test]
    fn test_should_fall_back_to_default_when_flag_is_unset() {
        assert!(!env_bool("DYNAMAP_LOCAL_TEST_UNSET_FLAG_9f3a", false));
        assert!(env_bool("DYNAMAP_LOCAL_TEST_UNSET_FLAG_9f3a", true));
    }
}
