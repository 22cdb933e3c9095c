//! Provider - Trait abstracting resource operations
//!
//! A Provider exposes a set of resource types to the host engine, accepts its
//! configuration block, and carries out create/read/update/delete for each
//! resource.

use std::future::Future;
use std::pin::Pin;

use crate::config::{ConfigError, ConfigReader};
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl From<ConfigError> for ProviderError {
    fn from(e: ConfigError) -> Self {
        ProviderError::new(e.to_string()).with_cause(e)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "universe_file")
    fn name(&self) -> &str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }
}

/// Main Provider trait
///
/// `configure` runs once per configuration event, before any resource
/// operation. Resource operations are async and may run concurrently.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "universe")
    fn name(&self) -> &str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Accept the provider configuration block
    ///
    /// On error the provider stays unconfigured.
    fn configure(&mut self, config: &dyn ConfigReader) -> ProviderResult<()>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the executor-assigned ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(
        &self,
        resource: &Resource,
        identifier: &str,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn configure(&mut self, config: &dyn ConfigReader) -> ProviderResult<()> {
        (**self).configure(config)
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(resource, identifier, prior)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(identifier, from, to)
    }

    fn delete(
        &self,
        resource: &Resource,
        identifier: &str,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(resource, identifier, prior)
    }
}
