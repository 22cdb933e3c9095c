//! Identity - Resolve the logical provider name
//!
//! Terraform finds plugins by executable name, so one binary copied or
//! symlinked as `terraform-provider-<name>` serves resource types under the
//! `<name>` namespace. Resolution order:
//!
//! 1. `TERRAFORM_UNIVERSE_PROVIDERNAME`, when set (even to "")
//! 2. The `<name>` part of a `terraform-provider-<name>[-<version>][-pre<n>]` invocation name
//! 3. `universe`
//!
//! Resolution never fails. Under test harnesses and debuggers the binary
//! name is something like `debug.test`, which falls through to the default.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::env::Environment;

/// Identity used when nothing else applies
pub const DEFAULT_PROVIDER_NAME: &str = "universe";

/// Environment variable overriding the provider name
pub const ENV_PROVIDER_NAME: &str = "TERRAFORM_UNIVERSE_PROVIDERNAME";

static BINARY_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^terraform-provider-([^0-9]+)(?:-([0-9]+(?:\.[0-9]+(?:\.[0-9]+)?)?))?(?:-pre[0-9]*)?$")
        .expect("binary name pattern is valid")
});

/// Logical provider name under which resource types are namespaced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderIdentity(String);

impl ProviderIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix every non-default resource type carries (e.g. "widget_")
    pub fn type_prefix(&self) -> String {
        format!("{}_", self.0)
    }

    /// Name of the variable listing extra resource types
    /// (e.g. "TERRAFORM_WIDGET_RESOURCETYPES")
    ///
    /// Case mapping is one character to one character; a character whose
    /// uppercase form is longer (such as `ß`) is kept as is.
    pub fn resource_types_var(&self) -> String {
        let upper: String = self
            .0
            .chars()
            .map(|c| {
                let mut mapped = c.to_uppercase();
                match (mapped.next(), mapped.next()) {
                    (Some(u), None) => u,
                    _ => c,
                }
            })
            .collect();
        format!("TERRAFORM_{}_RESOURCETYPES", upper)
    }
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_NAME)
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the provider identity from the invocation name (argv[0]) and environment
pub fn resolve(process_name: &str, env: &dyn Environment) -> ProviderIdentity {
    if let Some(name) = env.var(ENV_PROVIDER_NAME) {
        log::debug!("Provider name taken from {}: {:?}", ENV_PROVIDER_NAME, name);
        return ProviderIdentity::new(name);
    }

    let binary_name = binary_name(process_name);
    match name_from_binary(binary_name) {
        Some(name) => {
            log::debug!("Provider name taken from binary name {:?}", binary_name);
            ProviderIdentity::new(name)
        }
        None => {
            log::debug!(
                "Binary name {:?} does not name a provider, using default",
                binary_name
            );
            ProviderIdentity::default()
        }
    }
}

/// Extract `<name>` from `terraform-provider-<name>[-<version>][-pre<n>]`
pub fn name_from_binary(binary_name: &str) -> Option<&str> {
    BINARY_NAME_PATTERN
        .captures(binary_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn binary_name(process_name: &str) -> &str {
    Path::new(process_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(process_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnvironment;

    fn resolve_without_env(process_name: &str) -> String {
        resolve(process_name, &MapEnvironment::new()).to_string()
    }

    #[test]
    fn plain_binary_name() {
        assert_eq!(resolve_without_env("terraform-provider-widget"), "widget");
        assert_eq!(resolve_without_env("terraform-provider-universe"), "universe");
    }

    #[test]
    fn version_suffix_is_stripped() {
        assert_eq!(resolve_without_env("terraform-provider-widget-1.2.3"), "widget");
        assert_eq!(resolve_without_env("terraform-provider-widget-1.2"), "widget");
        assert_eq!(resolve_without_env("terraform-provider-widget-1"), "widget");
    }

    #[test]
    fn pre_release_suffix_is_stripped() {
        assert_eq!(
            resolve_without_env("terraform-provider-widget-0.1.0-pre2"),
            "widget"
        );
        assert_eq!(resolve_without_env("terraform-provider-widget-2-pre"), "widget");
    }

    #[test]
    fn directory_is_ignored() {
        assert_eq!(
            resolve_without_env("/home/me/.terraform.d/plugins/terraform-provider-linux_box-0.4.1"),
            "linux_box"
        );
    }

    #[test]
    fn unmatched_names_fall_back_to_default() {
        assert_eq!(resolve_without_env("debug.test"), DEFAULT_PROVIDER_NAME);
        assert_eq!(resolve_without_env("universe-abc123"), DEFAULT_PROVIDER_NAME);
        assert_eq!(resolve_without_env("terraform-provider-"), DEFAULT_PROVIDER_NAME);
        assert_eq!(
            resolve_without_env("terraform-provider-widget-1.2.3.4"),
            DEFAULT_PROVIDER_NAME
        );
        assert_eq!(resolve_without_env(""), DEFAULT_PROVIDER_NAME);
    }

    #[test]
    fn only_ascii_digits_end_the_name() {
        assert_eq!(resolve_without_env("terraform-provider-widget٣"), "widget٣");
        assert_eq!(
            resolve_without_env("terraform-provider-widget٣-1.0"),
            "widget٣"
        );
    }

    #[test]
    fn override_wins() {
        let env = MapEnvironment::new().with_var(ENV_PROVIDER_NAME, "gadget");
        assert_eq!(resolve("terraform-provider-widget", &env).as_str(), "gadget");
    }

    #[test]
    fn empty_override_wins() {
        let env = MapEnvironment::new().with_var(ENV_PROVIDER_NAME, "");
        assert_eq!(resolve("terraform-provider-widget", &env).as_str(), "");
    }

    #[test]
    fn derived_names() {
        let identity = ProviderIdentity::new("widget");
        assert_eq!(identity.type_prefix(), "widget_");
        assert_eq!(identity.resource_types_var(), "TERRAFORM_WIDGET_RESOURCETYPES");
    }

    #[test]
    fn resource_types_var_uses_simple_case_mapping() {
        assert_eq!(
            ProviderIdentity::new("straße").resource_types_var(),
            "TERRAFORM_STRAßE_RESOURCETYPES"
        );
        assert_eq!(
            ProviderIdentity::new("linux_box").resource_types_var(),
            "TERRAFORM_LINUX_BOX_RESOURCETYPES"
        );
    }
}
