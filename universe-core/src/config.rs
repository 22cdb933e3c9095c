//! Config - Normalize the provider configuration block
//!
//! The host engine hands over a loosely typed configuration. `normalize` turns
//! it into a `ConfigurationSnapshot`: only the recognized keys, only the ones
//! actually supplied, with `environment` checked to be a flat map of strings.
//! The snapshot is shared read-only by every resource operation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

/// Dynamic configuration value as produced by the host schema adapter
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// An explicit JSON `null`
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// String form of a scalar; `None` for null, lists and maps
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Null | ConfigValue::List(_) | ConfigValue::Map(_) => None,
        }
    }

    /// Convert from JSON, keeping nested nulls
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => n.as_f64().map_or(ConfigValue::Null, ConfigValue::Float),
            },
            serde_json::Value::String(s) => ConfigValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                ConfigValue::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::String(s) => json!(s),
            ConfigValue::Bool(b) => json!(b),
            ConfigValue::Int(i) => json!(i),
            ConfigValue::Float(f) => json!(f),
            ConfigValue::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            ConfigValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "Null",
            ConfigValue::String(_) => "String",
            ConfigValue::Bool(_) => "Bool",
            ConfigValue::Int(_) => "Int",
            ConfigValue::Float(_) => "Float",
            ConfigValue::List(_) => "List",
            ConfigValue::Map(_) => "Map",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.to_json())
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `environment` was supplied but is not a flat map of string-like values
    #[error("environment - expected a map of strings but got {found}")]
    EnvironmentShape { found: String },

    /// The configuration document itself is not an object
    #[error("provider configuration must be an object, got {found}")]
    NotAnObject { found: String },
}

/// Recognized configuration keys, in snapshot order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    IdKey,
    Executor,
    Script,
    Environment,
    /// Read but not part of the published schema; carried through untouched
    Javascript,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::IdKey,
        ConfigKey::Executor,
        ConfigKey::Script,
        ConfigKey::Environment,
        ConfigKey::Javascript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::IdKey => "id_key",
            ConfigKey::Executor => "executor",
            ConfigKey::Script => "script",
            ConfigKey::Environment => "environment",
            ConfigKey::Javascript => "javascript",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw configuration values
pub trait ConfigReader {
    /// The value of `key` if it was supplied. Unset optional fields return `None`
    /// rather than an empty default.
    fn get_ok(&self, key: &str) -> Option<ConfigValue>;
}

impl ConfigReader for HashMap<String, ConfigValue> {
    fn get_ok(&self, key: &str) -> Option<ConfigValue> {
        self.get(key).cloned()
    }
}

impl ConfigReader for BTreeMap<String, ConfigValue> {
    fn get_ok(&self, key: &str) -> Option<ConfigValue> {
        self.get(key).cloned()
    }
}

/// Configuration block given as a JSON object
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl JsonConfig {
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        match value {
            serde_json::Value::Object(fields) => Ok(Self { fields }),
            serde_json::Value::Null => Ok(Self::default()),
            other => Err(ConfigError::NotAnObject {
                found: other.to_string(),
            }),
        }
    }
}

impl ConfigReader for JsonConfig {
    fn get_ok(&self, key: &str) -> Option<ConfigValue> {
        // A top-level null means the key was left unset
        self.fields
            .get(key)
            .filter(|v| !v.is_null())
            .map(ConfigValue::from_json)
    }
}

/// Validated, sparse provider configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationSnapshot {
    values: BTreeMap<ConfigKey, ConfigValue>,
    environment: Option<BTreeMap<String, String>>,
}

impl ConfigurationSnapshot {
    /// Start an empty snapshot; normally produced by [`normalize`]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn get(&self, key: ConfigKey) -> Option<&ConfigValue> {
        self.values.get(&key)
    }

    pub fn contains_key(&self, key: ConfigKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Supplied keys, in fixed order
    pub fn keys(&self) -> impl Iterator<Item = ConfigKey> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn id_key(&self) -> Option<&str> {
        self.string(ConfigKey::IdKey)
    }

    pub fn executor(&self) -> Option<&str> {
        self.string(ConfigKey::Executor)
    }

    pub fn script(&self) -> Option<&str> {
        self.string(ConfigKey::Script)
    }

    pub fn environment(&self) -> Option<&BTreeMap<String, String>> {
        self.environment.as_ref()
    }

    pub fn javascript(&self) -> Option<&str> {
        self.string(ConfigKey::Javascript)
    }

    /// The snapshot as a sparse JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_json()))
                .collect(),
        )
    }

    fn string(&self, key: ConfigKey) -> Option<&str> {
        self.values.get(&key).and_then(ConfigValue::as_str)
    }
}

/// Assembles a snapshot, validating `environment` as it goes
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: ConfigurationSnapshot,
}

impl SnapshotBuilder {
    pub fn set(mut self, key: ConfigKey, value: impl Into<ConfigValue>) -> Result<Self, ConfigError> {
        let value = value.into();
        if key == ConfigKey::Environment {
            let environment = environment_map(&value)?;
            self.snapshot.values.insert(
                key,
                ConfigValue::Map(
                    environment
                        .iter()
                        .map(|(k, v)| (k.clone(), ConfigValue::String(v.clone())))
                        .collect(),
                ),
            );
            self.snapshot.environment = Some(environment);
        } else {
            self.snapshot.values.insert(key, value);
        }
        Ok(self)
    }

    pub fn build(self) -> Arc<ConfigurationSnapshot> {
        Arc::new(self.snapshot)
    }
}

/// Normalize a raw configuration into a snapshot
///
/// Fails only when `environment` is supplied with the wrong shape; in that case
/// no snapshot is produced.
pub fn normalize(reader: &dyn ConfigReader) -> Result<Arc<ConfigurationSnapshot>, ConfigError> {
    let mut builder = ConfigurationSnapshot::builder();

    for key in ConfigKey::ALL {
        let Some(value) = reader.get_ok(key.as_str()) else {
            continue;
        };
        if key == ConfigKey::Javascript {
            log::warn!("'javascript' is not a recognized provider setting and has no effect");
        }
        builder = builder.set(key, value)?;
    }

    let snapshot = builder.build();
    log::debug!(
        "Provider configured with keys: {}",
        snapshot
            .keys()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(snapshot)
}

fn environment_map(value: &ConfigValue) -> Result<BTreeMap<String, String>, ConfigError> {
    let shape_error = || ConfigError::EnvironmentShape {
        found: value.to_string(),
    };

    let ConfigValue::Map(map) = value else {
        return Err(shape_error());
    };

    map.iter()
        .map(|(k, v)| {
            v.scalar_string()
                .map(|s| (k.clone(), s))
                .ok_or_else(shape_error)
        })
        .collect()
}
