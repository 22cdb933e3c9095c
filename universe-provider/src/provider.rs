//! Universe Provider implementation
//!
//! This module contains the provider that resolves its identity and resource
//! types at construction, holds the configuration snapshot, and runs the
//! executor for every resource operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use universe_core::config::{ConfigReader, ConfigurationSnapshot, normalize};
use universe_core::provider::{ProviderError, ProviderResult};
use universe_core::resource::{Resource, ResourceId, State, Value};
use universe_core::schema::resource_schema;
use universe_core::{Environment, ProviderIdentity, ResourceTypeSet, resolve};

use crate::executor::{Event, ExecutorError, Invocation, Payload};

/// Key holding the resource identifier in executor output, unless configured
pub const DEFAULT_ID_KEY: &str = "id";

/// Attribute holding the executor's last output
pub const RESULT_ATTRIBUTE: &str = "result";

/// Attribute holding the desired properties
pub const CONFIG_ATTRIBUTE: &str = "config";

/// Executor settings for one resource: resource attributes over provider configuration
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    executor: String,
    script: String,
    id_key: String,
    environment: BTreeMap<String, String>,
}

/// Universe Provider
pub struct UniverseProvider {
    types: ResourceTypeSet,
    snapshot: Option<Arc<ConfigurationSnapshot>>,
}

impl UniverseProvider {
    /// Create an unconfigured provider exposing `types`
    pub fn new(types: ResourceTypeSet) -> Self {
        Self {
            types,
            snapshot: None,
        }
    }

    /// Resolve identity and resource types from the invocation name and environment
    pub fn from_environment(process_name: &str, env: &dyn Environment) -> Self {
        let identity = resolve(process_name, env);
        log::info!("universe provider name is: {}", identity);
        Self::new(ResourceTypeSet::build(&identity, env))
    }

    pub fn identity(&self) -> &ProviderIdentity {
        self.types.identity()
    }

    pub fn types(&self) -> &ResourceTypeSet {
        &self.types
    }

    /// The current configuration, if `configure` has succeeded
    pub fn snapshot(&self) -> Option<&Arc<ConfigurationSnapshot>> {
        self.snapshot.as_ref()
    }

    /// Normalize and store the provider configuration
    pub fn apply_configuration(&mut self, config: &dyn ConfigReader) -> ProviderResult<()> {
        self.snapshot = None;
        let snapshot = normalize(config)?;
        self.snapshot = Some(snapshot);
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource; an executor that prints nothing reports it gone
    pub async fn read_resource(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
        prior_result: Option<serde_json::Value>,
    ) -> ProviderResult<State> {
        let id = resource.id.clone();
        self.check_type(&id)?;

        let Some(identifier) = identifier else {
            return Ok(State::not_found(id));
        };

        let settings = self.settings(resource)?;
        let output = self
            .invoke(&settings, Event::Read, resource, Some(identifier), prior_result)
            .await?;

        match output {
            Some(result) => Ok(state_with_result(resource, Some(result)).with_identifier(identifier)),
            None => Ok(State::not_found(id)),
        }
    }

    /// Create a resource; the identifier is taken from the output's id key
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        self.check_resource(&resource)?;

        let settings = self.settings(&resource)?;
        let output = self
            .invoke(&settings, Event::Create, &resource, None, None)
            .await?;

        let identifier = output
            .as_ref()
            .and_then(|o| o.get(&settings.id_key))
            .and_then(identifier_string)
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "executor output has no '{}' field to identify the resource",
                    settings.id_key
                ))
                .for_resource(resource.id.clone())
            })?;

        log::info!(
            "Created {}.{} as {}",
            resource.id.resource_type,
            resource.id.name,
            identifier
        );
        Ok(state_with_result(&resource, output).with_identifier(identifier))
    }

    /// Update a resource in place; empty output keeps the prior result
    pub async fn update_resource(
        &self,
        identifier: &str,
        prior_result: Option<serde_json::Value>,
        to: Resource,
    ) -> ProviderResult<State> {
        self.check_resource(&to)?;

        let settings = self.settings(&to)?;
        let output = self
            .invoke(
                &settings,
                Event::Update,
                &to,
                Some(identifier),
                prior_result.clone(),
            )
            .await?;

        Ok(state_with_result(&to, output.or(prior_result)).with_identifier(identifier))
    }

    /// Delete a resource
    pub async fn delete_resource(
        &self,
        resource: &Resource,
        identifier: &str,
        prior_result: Option<serde_json::Value>,
    ) -> ProviderResult<()> {
        self.check_type(&resource.id)?;

        let settings = self.settings(resource)?;
        self.invoke(
            &settings,
            Event::Delete,
            resource,
            Some(identifier),
            prior_result,
        )
        .await?;

        log::info!(
            "Deleted {}.{} ({})",
            resource.id.resource_type,
            resource.id.name,
            identifier
        );
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn invoke(
        &self,
        settings: &Settings,
        event: Event,
        resource: &Resource,
        identifier: Option<&str>,
        prior_result: Option<serde_json::Value>,
    ) -> ProviderResult<Option<serde_json::Value>> {
        let invocation = Invocation {
            executor: &settings.executor,
            script: &settings.script,
            event,
            resource_type: &resource.id.resource_type,
            environment: &settings.environment,
            payload: Payload {
                id: identifier.map(str::to_string),
                config: resource
                    .attributes
                    .get(CONFIG_ATTRIBUTE)
                    .map(Value::to_json)
                    .unwrap_or(serde_json::Value::Null),
                result: prior_result,
            },
        };

        invocation
            .run()
            .await
            .map_err(|e| executor_error(e, &resource.id))
    }

    fn settings(&self, resource: &Resource) -> ProviderResult<Settings> {
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            ProviderError::new("provider is not configured").for_resource(resource.id.clone())
        })?;

        let missing = |name: &str| {
            ProviderError::new(format!(
                "no {} configured; set '{}' on the provider or the resource",
                name, name
            ))
            .for_resource(resource.id.clone())
        };

        let executor = resource
            .string_attribute("executor")
            .or(snapshot.executor())
            .ok_or_else(|| missing("executor"))?;
        let script = resource
            .string_attribute("script")
            .or(snapshot.script())
            .ok_or_else(|| missing("script"))?;
        let id_key = resource
            .string_attribute("id_key")
            .or(snapshot.id_key())
            .unwrap_or(DEFAULT_ID_KEY);

        let mut environment = snapshot.environment().cloned().unwrap_or_default();
        if let Some(overrides) = resource.attributes.get("environment") {
            let overrides = overrides.as_map().ok_or_else(|| {
                ProviderError::new(format!(
                    "environment must be a map of strings, got {}",
                    overrides.type_name()
                ))
                .for_resource(resource.id.clone())
            })?;
            for (key, value) in overrides {
                let value = value.scalar_string().ok_or_else(|| {
                    ProviderError::new(format!(
                        "environment.{} must be a string, got {}",
                        key,
                        value.type_name()
                    ))
                    .for_resource(resource.id.clone())
                })?;
                environment.insert(key.clone(), value);
            }
        }

        Ok(Settings {
            executor: executor.to_string(),
            script: script.to_string(),
            id_key: id_key.to_string(),
            environment,
        })
    }

    fn check_type(&self, id: &ResourceId) -> ProviderResult<()> {
        if self.types.contains(&id.resource_type) {
            Ok(())
        } else {
            Err(
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone()),
            )
        }
    }

    fn check_resource(&self, resource: &Resource) -> ProviderResult<()> {
        self.check_type(&resource.id)?;
        resource_schema(&resource.id.resource_type)
            .validate(&resource.attributes)
            .map_err(|errors| {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                ProviderError::new(messages.join("; ")).for_resource(resource.id.clone())
            })
    }
}

/// The executor's last output as stored in state
pub fn prior_result(state: &State) -> Option<serde_json::Value> {
    state.attributes.get(RESULT_ATTRIBUTE).map(Value::to_json)
}

fn state_with_result(resource: &Resource, result: Option<serde_json::Value>) -> State {
    let mut attributes = resource.attributes.clone();
    attributes.remove(RESULT_ATTRIBUTE);
    if let Some(value) = result.as_ref().and_then(Value::from_json) {
        attributes.insert(RESULT_ATTRIBUTE.to_string(), value);
    }
    State::existing(resource.id.clone(), attributes)
}

fn identifier_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn executor_error(e: ExecutorError, id: &ResourceId) -> ProviderError {
    ProviderError::new(e.to_string())
        .with_cause(e)
        .for_resource(id.clone())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use universe_core::MapEnvironment;
    use universe_core::config::{ConfigValue, JsonConfig};

    use super::*;

    fn provider(types: &str) -> UniverseProvider {
        UniverseProvider::new(ResourceTypeSet::from_list(
            &ProviderIdentity::new("universe"),
            types,
        ))
    }

    fn configured(config: serde_json::Value) -> UniverseProvider {
        let mut provider = provider("file");
        provider
            .apply_configuration(&JsonConfig::from_value(config).unwrap())
            .unwrap();
        provider
    }

    fn resource(resource_type: &str) -> Resource {
        let mut config = HashMap::new();
        config.insert("path".to_string(), Value::String("/tmp/x".to_string()));
        Resource::new(resource_type, "example").with_attribute(CONFIG_ATTRIBUTE, Value::Map(config))
    }

    #[test]
    fn from_environment_resolves_identity_and_types() {
        let env = MapEnvironment::new().with_var("TERRAFORM_WIDGET_RESOURCETYPES", "foo widget_bar");
        let provider = UniverseProvider::from_environment("/plugins/terraform-provider-widget-1.0.0", &env);

        assert_eq!(provider.identity().as_str(), "widget");
        let names: Vec<&str> = provider.types().iter().collect();
        assert_eq!(names, vec!["widget", "widget_bar", "widget_foo"]);
        assert!(provider.snapshot().is_none());
    }

    #[test]
    fn failed_configuration_leaves_provider_unconfigured() {
        let mut provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        assert!(provider.snapshot().is_some());

        let mut raw = HashMap::new();
        raw.insert("environment".to_string(), ConfigValue::from("A=1"));
        assert!(provider.apply_configuration(&raw).is_err());
        assert!(provider.snapshot().is_none());
    }

    #[test]
    fn settings_prefer_resource_attributes() {
        let provider = configured(json!({
            "executor": "python3",
            "script": "provider.py",
            "environment": {"REGION": "eu", "TIER": "gold"}
        }));

        let mut env = HashMap::new();
        env.insert("TIER".to_string(), Value::String("silver".to_string()));
        let resource = resource("universe_file")
            .with_attribute("script", Value::String("file.py".to_string()))
            .with_attribute("id_key", Value::String("name".to_string()))
            .with_attribute("environment", Value::Map(env));

        let settings = provider.settings(&resource).unwrap();
        assert_eq!(settings.executor, "python3");
        assert_eq!(settings.script, "file.py");
        assert_eq!(settings.id_key, "name");
        assert_eq!(settings.environment.get("REGION").map(String::as_str), Some("eu"));
        assert_eq!(settings.environment.get("TIER").map(String::as_str), Some("silver"));
    }

    #[test]
    fn settings_render_scalar_overrides() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let mut env = HashMap::new();
        env.insert("N".to_string(), Value::Int(1));
        env.insert("DEBUG".to_string(), Value::Bool(true));
        let resource = resource("universe").with_attribute("environment", Value::Map(env));

        let settings = provider.settings(&resource).unwrap();
        assert_eq!(settings.environment.get("N").map(String::as_str), Some("1"));
        assert_eq!(settings.environment.get("DEBUG").map(String::as_str), Some("true"));
    }

    #[test]
    fn settings_reject_nested_overrides() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let mut env = HashMap::new();
        env.insert("LIST".to_string(), Value::List(vec![Value::Int(1)]));
        let nested = resource("universe").with_attribute("environment", Value::Map(env));

        let err = provider.settings(&nested).unwrap_err();
        assert_eq!(err.message, "environment.LIST must be a string, got List");
        assert_eq!(err.resource_id, Some(ResourceId::new("universe", "example")));

        let flat = resource("universe")
            .with_attribute("environment", Value::String("A=1".to_string()));
        let err = provider.settings(&flat).unwrap_err();
        assert!(err.message.starts_with("environment must be a map"));
    }

    #[test]
    fn settings_default_id_key() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let settings = provider.settings(&resource("universe")).unwrap();
        assert_eq!(settings.id_key, DEFAULT_ID_KEY);
        assert!(settings.environment.is_empty());
    }

    #[test]
    fn settings_require_executor() {
        let provider = configured(json!({"script": "a.sh"}));
        let err = provider.settings(&resource("universe")).unwrap_err();
        assert!(err.message.contains("executor"));
    }

    #[tokio::test]
    async fn operations_fail_before_configure() {
        let provider = provider("");
        let err = provider.create_resource(resource("universe")).await.unwrap_err();
        assert_eq!(err.message, "provider is not configured");
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let err = provider
            .create_resource(resource("universe_dns"))
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown resource type"));
    }

    #[tokio::test]
    async fn create_requires_config_attribute() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let err = provider
            .create_resource(Resource::new("universe", "bare"))
            .await
            .unwrap_err();
        assert!(err.message.contains("config"));
    }

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let provider = configured(json!({"executor": "sh", "script": "a.sh"}));
        let state = provider
            .read_resource(&resource("universe"), None, None)
            .await
            .unwrap();
        assert!(!state.exists);
    }

    #[test]
    fn identifiers_from_strings_and_numbers() {
        assert_eq!(identifier_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(identifier_string(&json!(42)), Some("42".to_string()));
        assert_eq!(identifier_string(&json!("")), None);
        assert_eq!(identifier_string(&json!({"id": 1})), None);
    }

    #[cfg(unix)]
    mod executor_backed {
        use tempfile::{TempDir, tempdir};

        use super::*;

        const SCRIPT: &str = r#"input=$(cat)
case "$1" in
  create) printf '{"id":"w-1","size":%s}' "${SIZE:-1}" ;;
  read) [ -f "$(dirname "$0")/gone" ] || printf '%s' "$input" ;;
  update) printf '{"id":"w-1","size":2}' ;;
  delete) ;;
esac
"#;

        fn setup() -> (TempDir, UniverseProvider) {
            let dir = tempdir().unwrap();
            let script = dir.path().join("crud.sh");
            std::fs::write(&script, SCRIPT).unwrap();
            let provider = configured(json!({
                "executor": "sh",
                "script": script.to_str().unwrap(),
                "environment": {"SIZE": 5}
            }));
            (dir, provider)
        }

        #[tokio::test]
        async fn lifecycle() {
            let (dir, provider) = setup();

            let created = provider.create_resource(resource("universe_file")).await.unwrap();
            assert!(created.exists);
            assert_eq!(created.identifier.as_deref(), Some("w-1"));
            assert_eq!(
                prior_result(&created),
                Some(json!({"id": "w-1", "size": 5}))
            );

            let read = provider
                .read_resource(&resource("universe_file"), Some("w-1"), prior_result(&created))
                .await
                .unwrap();
            assert!(read.exists);
            // read echoes its input back
            assert_eq!(
                prior_result(&read),
                Some(json!({
                    "id": "w-1",
                    "config": {"path": "/tmp/x"},
                    "result": {"id": "w-1", "size": 5}
                }))
            );

            let updated = provider
                .update_resource("w-1", prior_result(&created), resource("universe_file"))
                .await
                .unwrap();
            assert_eq!(prior_result(&updated), Some(json!({"id": "w-1", "size": 2})));

            provider
                .delete_resource(&resource("universe_file"), "w-1", prior_result(&updated))
                .await
                .unwrap();

            std::fs::write(dir.path().join("gone"), "").unwrap();
            let gone = provider
                .read_resource(&resource("universe_file"), Some("w-1"), None)
                .await
                .unwrap();
            assert!(!gone.exists);
        }

        #[tokio::test]
        async fn read_passes_numeric_environment_override() {
            let dir = tempdir().unwrap();
            let script = dir.path().join("env.sh");
            std::fs::write(&script, r#"printf '{"n":"%s"}' "$N""#).unwrap();
            let provider = configured(json!({"executor": "sh", "script": script.to_str().unwrap()}));

            let mut env = HashMap::new();
            env.insert("N".to_string(), Value::Int(1));
            let resource = resource("universe").with_attribute("environment", Value::Map(env));
            let state = provider
                .read_resource(&resource, Some("w-1"), None)
                .await
                .unwrap();
            assert_eq!(prior_result(&state), Some(json!({"n": "1"})));
        }

        #[tokio::test]
        async fn create_without_identifier_fails() {
            let (_dir, provider) = setup();
            let resource = resource("universe").with_attribute("id_key", Value::String("name".to_string()));
            let err = provider.create_resource(resource).await.unwrap_err();
            assert!(err.message.contains("'name'"));
            assert_eq!(err.resource_id, Some(ResourceId::new("universe", "example")));
        }
    }
}
