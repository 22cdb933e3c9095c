//! Universe Core
//!
//! Core library for a provider that hands the lifecycle of arbitrary resource
//! types to an external executor. It resolves the provider's identity, builds
//! the set of resource types it exposes, and normalizes its configuration.

pub mod config;
pub mod env;
pub mod identity;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;

pub use config::{ConfigError, ConfigReader, ConfigValue, ConfigurationSnapshot, normalize};
pub use env::{Environment, MapEnvironment, ProcessEnvironment};
pub use identity::{ProviderIdentity, resolve};
pub use registry::ResourceTypeSet;
