//! Universe Provider
//!
//! A provider whose resource types are all handled by one external program.
//!
//! ## Module Structure
//!
//! - `resources` - The generic resource type bound to every registered name
//! - `provider` - UniverseProvider implementation
//! - `executor` - Running the executor and its stdin/stdout protocol

pub mod executor;
pub mod provider;
pub mod resources;

// Re-export main types
pub use executor::{Event, ExecutorError};
pub use provider::{UniverseProvider, prior_result};

use universe_core::config::ConfigReader;
use universe_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use universe_core::resource::{Resource, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for UniverseProvider {
    fn name(&self) -> &str {
        self.identity().as_str()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types(self.types())
    }

    fn configure(&mut self, config: &dyn ConfigReader) -> ProviderResult<()> {
        self.apply_configuration(config)
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        let identifier = identifier.map(|s| s.to_string());
        let prior_result = prior.and_then(prior_result);
        Box::pin(async move {
            self.read_resource(&resource, identifier.as_deref(), prior_result)
                .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let identifier = identifier.to_string();
        let prior_result = prior_result(from);
        let to = to.clone();
        Box::pin(async move { self.update_resource(&identifier, prior_result, to).await })
    }

    fn delete(
        &self,
        resource: &Resource,
        identifier: &str,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let resource = resource.clone();
        let identifier = identifier.to_string();
        let prior_result = prior.and_then(prior_result);
        Box::pin(async move {
            self.delete_resource(&resource, &identifier, prior_result)
                .await
        })
    }
}
