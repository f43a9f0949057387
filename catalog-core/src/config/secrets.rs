use super::ConfigError;

/// Resolves `${...}` references embedded in configuration strings.
///
/// Deployments inject credentials (database password, telemetry keys) through
/// environment variables or mounted secret files rather than committing them
/// to `application.yaml`.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

/// Default resolver: env vars and file references.
///
/// - `${VAR_NAME}`: environment variable
/// - `${env:VAR_NAME}`: explicit environment variable
/// - `${file:/path/to/secret}`: file contents, trimmed
pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        if let Some(path) = reference.strip_prefix("file:") {
            std::fs::read_to_string(path.trim())
                .map(|s| s.trim().to_string())
                .map_err(|e| ConfigError::Load(format!("Secret file '{}': {}", path.trim(), e)))
        } else if let Some(var) = reference.strip_prefix("env:") {
            std::env::var(var.trim())
                .map_err(|_| ConfigError::NotFound(format!("env:{}", var.trim())))
        } else {
            std::env::var(reference.trim())
                .map_err(|_| ConfigError::NotFound(reference.trim().to_string()))
        }
    }
}

/// Resolve every `${...}` placeholder in `value`.
pub fn resolve_placeholders(
    value: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let end = rest[start..]
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("Unclosed placeholder in: {value}")))?;
        result.push_str(&rest[..start]);
        result.push_str(&resolver.resolve(&rest[start + 2..start + end])?);
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
