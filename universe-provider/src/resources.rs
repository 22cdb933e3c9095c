//! Resource type definitions
//!
//! Every registered type is the same generic template: its behavior comes
//! entirely from the executor, so only the name differs.

use universe_core::ResourceTypeSet;
use universe_core::provider::ResourceType;
use universe_core::schema::{ResourceSchema, resource_schema};

/// A resource type handled by the configured executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorResourceType {
    name: String,
}

impl ExecutorResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ResourceType for ExecutorResourceType {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> ResourceSchema {
        resource_schema(&self.name)
    }
}

/// One generic resource type per registered name
pub fn resource_types(types: &ResourceTypeSet) -> Vec<Box<dyn ResourceType>> {
    types
        .iter()
        .map(|name| Box::new(ExecutorResourceType::new(name)) as Box<dyn ResourceType>)
        .collect()
}
