//! Schema - Attribute schemas for the provider block and its resources
//!
//! The provider publishes one schema for its configuration block and one
//! generic schema shared by every registered resource type.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::registry::ResourceTypeSet;
use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Bool,
    /// Any JSON-representable value
    Dynamic,
    List(Box<AttributeType>),
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::Dynamic, _) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Dynamic => "Dynamic".to_string(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider, never by the user
    pub computed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: BTreeMap<String, AttributeSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate user-supplied resource attributes
    pub fn validate(
        &self,
        attributes: &std::collections::HashMap<String, Value>,
    ) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Sorted so errors come out in a stable order
        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        for name in names {
            let Some(schema) = self.attributes.get(name) else {
                // Unknown attributes are allowed
                continue;
            };
            if schema.computed {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
            } else if let Err(e) = schema.attr_type.validate(&attributes[name]) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Full schema published to the host engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSchema {
    pub provider: String,
    pub config: BTreeMap<String, AttributeSchema>,
    pub resources: BTreeMap<String, ResourceSchema>,
}

impl ProviderSchema {
    /// Provider block schema plus the generic schema for every registered type
    pub fn new(types: &ResourceTypeSet) -> Self {
        Self {
            provider: types.identity().to_string(),
            config: provider_config_schema()
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
            resources: types
                .iter()
                .map(|name| (name.to_string(), resource_schema(name)))
                .collect(),
        }
    }
}

/// Attributes accepted in the provider configuration block
pub fn provider_config_schema() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("id_key", AttributeType::String).with_description(
            "The name of the key which holds the unique identifier of the resource. e.g. 'id'",
        ),
        AttributeSchema::new("executor", AttributeType::String)
            .with_description("The name of the program to run. e.g. python"),
        AttributeSchema::new("script", AttributeType::String).with_description(
            "The path to the script passed as the first argument to 'executor'.",
        ),
        AttributeSchema::new("environment", AttributeType::Map(Box::new(AttributeType::String)))
            .with_description(
                "The configuration passed as environment variables to the provider script.",
            ),
    ]
}

/// The schema every resource type shares
pub fn resource_schema(resource_type: &str) -> ResourceSchema {
    ResourceSchema::new(resource_type)
        .with_description("A resource whose lifecycle is implemented by an external executor")
        .attribute(
            AttributeSchema::new("config", AttributeType::Map(Box::new(AttributeType::Dynamic)))
                .required()
                .with_description("Desired properties, passed to the executor on stdin"),
        )
        .attribute(
            AttributeSchema::new("executor", AttributeType::String)
                .with_description("Overrides the provider's executor for this resource"),
        )
        .attribute(
            AttributeSchema::new("script", AttributeType::String)
                .with_description("Overrides the provider's script for this resource"),
        )
        .attribute(
            AttributeSchema::new("id_key", AttributeType::String)
                .with_description("Overrides the provider's id_key for this resource"),
        )
        .attribute(
            AttributeSchema::new("environment", AttributeType::Map(Box::new(AttributeType::String)))
                .with_description("Merged over the provider's environment for this resource"),
        )
        .attribute(
            AttributeSchema::new("result", AttributeType::Map(Box::new(AttributeType::Dynamic)))
                .computed()
                .with_description("Output of the last executor invocation"),
        )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::identity::ProviderIdentity;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_string_map() {
        let t = AttributeType::Map(Box::new(AttributeType::String));
        let mut map = HashMap::new();
        map.insert("A".to_string(), Value::String("1".to_string()));
        assert!(t.validate(&Value::Map(map.clone())).is_ok());

        map.insert("B".to_string(), Value::List(vec![]));
        let err = t.validate(&Value::Map(map)).unwrap_err();
        assert!(matches!(err, TypeError::MapValueError { ref key, .. } if key == "B"));
    }

    #[test]
    fn resource_schema_requires_config() {
        let schema = resource_schema("universe");
        let errors = schema.validate(&HashMap::new()).unwrap_err();
        assert_eq!(
            errors,
            vec![TypeError::MissingRequired {
                name: "config".to_string()
            }]
        );
    }

    #[test]
    fn resource_schema_rejects_computed_result() {
        let schema = resource_schema("universe");
        let mut attrs = HashMap::new();
        attrs.insert("config".to_string(), Value::Map(HashMap::new()));
        attrs.insert("result".to_string(), Value::Map(HashMap::new()));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(
            errors,
            vec![TypeError::ComputedAttribute {
                name: "result".to_string()
            }]
        );
    }

    #[test]
    fn resource_schema_accepts_overrides() {
        let schema = resource_schema("universe_file");
        let mut attrs = HashMap::new();
        let mut config = HashMap::new();
        config.insert("size".to_string(), Value::Int(3));
        config.insert("tags".to_string(), Value::List(vec![]));
        attrs.insert("config".to_string(), Value::Map(config));
        attrs.insert("executor".to_string(), Value::String("bash".to_string()));
        attrs.insert("unknown".to_string(), Value::Int(1));
        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn resource_schema_rejects_scalar_config() {
        let schema = resource_schema("universe_file");
        let mut attrs = HashMap::new();
        attrs.insert("config".to_string(), Value::String("anything".to_string()));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(
            errors,
            vec![TypeError::TypeMismatch {
                expected: "Map<Dynamic>".to_string(),
                got: "String".to_string()
            }]
        );
    }

    #[test]
    fn provider_schema_covers_every_type() {
        let types = ResourceTypeSet::from_list(&ProviderIdentity::new("widget"), "foo bar");
        let schema = ProviderSchema::new(&types);

        assert_eq!(schema.provider, "widget");
        let resources: Vec<&str> = schema.resources.keys().map(String::as_str).collect();
        assert_eq!(resources, vec!["widget", "widget_bar", "widget_foo"]);
        let config: Vec<&str> = schema.config.keys().map(String::as_str).collect();
        assert_eq!(config, vec!["environment", "executor", "id_key", "script"]);
        assert!(!schema.config.contains_key("javascript"));
    }
}
