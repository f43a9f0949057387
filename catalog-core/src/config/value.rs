use std::collections::HashMap;
use std::time::Duration;

use super::ConfigError;

/// A single configuration value that can be converted to various types.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ConfigValue>),
    Map(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub(crate) fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    ConfigValue::Float(f)
                } else {
                    ConfigValue::String(n.to_string())
                }
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s.clone()),
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Sequence(seq) => {
                ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut result = HashMap::new();
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s.clone(),
                        other => format!("{other:?}"),
                    };
                    result.insert(key, ConfigValue::from_yaml(v));
                }
                ConfigValue::Map(result)
            }
            other => ConfigValue::String(format!("{other:?}")),
        }
    }
}

/// Trait for converting a `ConfigValue` into a concrete type.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as a config value type",
    label = "not a valid config value type",
    note = "built-in types: String, i64, f64, bool, Option<T>, Vec<T>. Implement `FromConfigValue` for custom types."
)]
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            ConfigValue::Null | ConfigValue::List(_) | ConfigValue::Map(_) => {
                Err(mismatch(key, "String"))
            }
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, "i64")),
            _ => Err(mismatch(key, "i64")),
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, "f64")),
            _ => Err(mismatch(key, "f64")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Bool(b) => Ok(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(mismatch(key, "bool")),
            },
            _ => Err(mismatch(key, "bool")),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Null => Ok(None),
            v => T::from_config_value(v, key).map(Some),
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| T::from_config_value(v, &format!("{key}[{i}]")))
                .collect(),
            // Env vars arrive as one string: split on commas
            ConfigValue::String(s) if s.contains(',') => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| T::from_config_value(&ConfigValue::String(part.to_string()), key))
                .collect(),
            other => Ok(vec![T::from_config_value(other, key)?]),
        }
    }
}

macro_rules! impl_from_config_int {
    ($($ty:ty),+) => {
        $(
            impl FromConfigValue for $ty {
                fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
                    let i = i64::from_config_value(value, key)?;
                    <$ty>::try_from(i).map_err(|_| mismatch(key, stringify!($ty)))
                }
            }
        )+
    };
}

impl_from_config_int!(u16, u32, u64, i32, usize);

/// Parse a `<integer><s|m|h>` duration such as `30s`, `1m` or `2h`.
///
/// Returns `None` for anything else, including a zero amount.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let unit = raw.chars().last()?;
    let secs_per_unit = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => return None,
    };
    let amount: u64 = raw[..raw.len() - 1].parse().ok()?;
    if amount == 0 {
        return None;
    }
    amount.checked_mul(secs_per_unit).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration(" 5m "), Some(Duration::from_secs(300)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("10d"), None);
        assert_eq!(parse_duration("1.5m"), None);
        assert_eq!(parse_duration("-1m"), None);
        assert_eq!(parse_duration("0s"), None);
        assert_eq!(parse_duration("PT1M"), None);
    }

    #[test]
    fn comma_separated_string_becomes_list() {
        let value = ConfigValue::String("/a, /b,/c".into());
        let list: Vec<String> = Vec::from_config_value(&value, "paths").unwrap();
        assert_eq!(list, vec!["/a", "/b", "/c"]);
    }
}
