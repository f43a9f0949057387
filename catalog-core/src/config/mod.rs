mod loader;
pub mod secrets;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use secrets::{DefaultSecretResolver, SecretResolver};
pub use value::{parse_duration, ConfigValue, FromConfigValue};

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Service configuration loaded from YAML files, `.env` files, and environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml` (base)
/// 2. `application-{profile}.yaml` (profile override)
/// 3. `.env` file (loaded into process environment)
/// 4. `.env.{profile}` file (loaded into process environment)
/// 5. Environment variables (e.g., `RATE_LIMIT_CAPACITY` overrides `rate-limit.capacity`)
///
/// `.env` files never overwrite already-set environment variables.
///
/// Keys are normalised on insert and lookup: lowercase, with `-` and `_`
/// treated as `.`. `rate-limit.refill-tokens`, `rate_limit.refill_tokens`
/// and `RATE_LIMIT_REFILL_TOKENS` therefore name the same entry.
///
/// Profile is determined by: `CATALOG_PROFILE` env var > argument > default `"dev"`.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl CatalogConfig {
    /// Load configuration for the given profile with a custom secret resolver.
    ///
    /// Looks for `application.yaml` and `application-{profile}.yaml` in the
    /// current working directory, resolves `${...}` placeholders in string values,
    /// then overlays environment variables.
    pub fn load_with_resolver(
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("CATALOG_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();

        loader::load_yaml_file(Path::new("application.yaml"), &mut values)?;

        let profile_path = format!("application-{active_profile}.yaml");
        loader::load_yaml_file(Path::new(&profile_path), &mut values)?;

        // .env files never overwrite variables that are already set
        let _ = dotenvy::dotenv();
        let profile_env = format!(".env.{active_profile}");
        let _ = dotenvy::from_filename(&profile_env);

        resolve_string_values(&mut values, resolver)?;

        for (env_key, env_val) in std::env::vars() {
            values.insert(normalize_key(&env_key), ConfigValue::String(env_val));
        }

        Ok(CatalogConfig {
            values,
            profile: active_profile,
        })
    }

    /// Load configuration for the given profile (default resolver: env + file).
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_with_resolver(profile, &DefaultSecretResolver)
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(CatalogConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        CatalogConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(normalize_key(key), value);
    }

    /// Get a typed value for the given dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(&normalize_key(key))
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning a default if the key is missing or malformed.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&normalize_key(key))
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

/// Canonical form of a config key: lowercase, `-` and `_` folded into `.`.
pub(crate) fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '-' | '_' => '.',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Resolve `${...}` placeholders in all string values of the config map.
fn resolve_string_values(
    values: &mut HashMap<String, ConfigValue>,
    resolver: &dyn SecretResolver,
) -> Result<(), ConfigError> {
    let keys: Vec<String> = values.keys().cloned().collect();
    for key in keys {
        if let Some(ConfigValue::String(s)) = values.get(&key) {
            if s.contains("${") {
                let resolved = secrets::resolve_placeholders(s, resolver)?;
                values.insert(key, ConfigValue::String(resolved));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::normalize_key;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(normalize_key("rate-limit.refill-tokens"), "rate.limit.refill.tokens");
        assert_eq!(normalize_key("RATE_LIMIT_REFILL_TOKENS"), "rate.limit.refill.tokens");
        assert_eq!(normalize_key("server.port"), "server.port");
    }
}
