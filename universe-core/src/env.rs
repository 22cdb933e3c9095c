//! Environment - Read-only access to environment variables
//!
//! Identity resolution and the resource type registry both read the process
//! environment. They take an `Environment` instead of calling `std::env`
//! directly so tests can supply their own variables.

use std::collections::HashMap;

/// Lookup of environment variables by name
pub trait Environment: Send + Sync {
    /// Returns the value of `key` if it is set, including when it is set to ""
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        // Non-UTF-8 values are still "set"; lossy conversion keeps them visible
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

/// In-memory environment
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
