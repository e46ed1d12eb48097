//! Uniboard client library: REST backend and push-channel plumbing.

pub mod api_client;
pub mod config;
pub mod error;
pub mod realtime;

pub use api_client::{ApiClientError, RestClient};
pub use config::{ClientConfig, ConfigError, DebounceConfig, ReconnectConfig};
pub use error::ClientError;
pub use realtime::{spawn_push_manager, PushClient};

/// Build the REST and push clients from one validated config.
pub fn bootstrap(config: &ClientConfig) -> Result<(RestClient, PushClient), ClientError> {
    let rest = RestClient::new(config)?;
    let push = PushClient::new(config);
    Ok((rest, push))
}
