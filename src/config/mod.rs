//! Configuration: TOML file, environment overrides and credentials.

mod credentials;
mod loader;
mod types;

pub use credentials::{bearer_header, SecureString};
pub use loader::{ConfigError, ENV_API_URL, ENV_TOKEN, ENV_USER_ID, ENV_WS_URL};
pub use types::{ApiConfig, AuthConfig, Config, EventsConfig};
