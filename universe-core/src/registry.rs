//! Registry - The set of resource types a provider instance exposes
//!
//! The identity itself is always a resource type. Extra types come from
//! `TERRAFORM_<IDENTITY>_RESOURCETYPES`, a whitespace-separated list; names
//! without the `<identity>_` prefix get it prepended.

use std::collections::BTreeSet;

use crate::env::Environment;
use crate::identity::ProviderIdentity;

/// Unique resource type names, ordered lexicographically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeSet {
    identity: ProviderIdentity,
    names: BTreeSet<String>,
}

impl ResourceTypeSet {
    /// Build the set from the environment variable derived from `identity`
    pub fn build(identity: &ProviderIdentity, env: &dyn Environment) -> Self {
        let var_name = identity.resource_types_var();
        let set = match env.var(&var_name) {
            Some(list) => Self::from_list(identity, &list),
            None => {
                log::debug!("{} is not set, exposing only {}", var_name, identity);
                Self::from_list(identity, "")
            }
        };

        for name in set.iter() {
            log::info!("provider {} has resource {}", identity, name);
        }
        set
    }

    /// Build the set from a whitespace-separated list of type names
    pub fn from_list(identity: &ProviderIdentity, list: &str) -> Self {
        let prefix = identity.type_prefix();
        let mut names = BTreeSet::new();
        names.insert(identity.as_str().to_string());

        for token in list.split_whitespace() {
            let name = if token.starts_with(&prefix) {
                token.to_string()
            } else {
                format!("{}{}", prefix, token)
            };
            names.insert(name);
        }

        Self {
            identity: identity.clone(),
            names,
        }
    }

    pub fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false: the identity is a member of every set
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `name` is the identity or carries its `<identity>_` prefix
    pub fn is_namespaced(&self, name: &str) -> bool {
        name == self.identity.as_str() || name.starts_with(&self.identity.type_prefix())
    }
}
