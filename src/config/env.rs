//! Process environment access
//!
//! Settings such as the upstream credential are read on every invocation
//! rather than cached at startup, so a rotated key takes effect on the next
//! request. Handlers read through [`Environment`] so tests can supply values
//! without touching the real process environment.

use std::collections::HashMap;

/// Source of environment variables
pub trait Environment: Send + Sync {
    /// Value of `key`, `None` when unset or blank
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_blank_is_absent() {
        let env = MapEnv::new().with("KEY", "   ");
        assert!(env.var("KEY").is_none());
    }

    #[test]
    fn test_map_env_lookup() {
        let env = MapEnv::new().with("KEY", "value");
        assert_eq!(env.var("KEY"), Some("value".to_string()));
        assert!(env.var("OTHER").is_none());
    }

    #[test]
    fn test_process_env_missing_var() {
        assert!(ProcessEnv.var("LLM_RELAY_TEST_SURELY_UNSET_VARIABLE").is_none());
    }
}
