pub mod config;
pub mod error;
pub mod layers;

pub use config::{
    CatalogConfig, ConfigError, ConfigValue, DefaultSecretResolver, FromConfigValue,
    SecretResolver,
};
pub use error::{error_response, FieldError, HttpError};
pub use layers::{catch_panic_layer, default_trace, init_tracing, LogFormat};
