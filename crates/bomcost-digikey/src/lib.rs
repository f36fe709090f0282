pub mod auth;
pub mod config;
pub mod product;
pub mod retry;

pub use auth::{execute as execute_auth, get_valid_token, AuthArgs, AuthCommand, AuthTokens};
pub use config::{ConfigError, ConfigFile, DigikeyConfig};
pub use product::{DigikeyClient, Product, ProductDetailsResponse};
pub use retry::RetryPolicy;

/// Authenticate and build a client ready to look up products
pub fn connect(config: DigikeyConfig) -> anyhow::Result<DigikeyClient> {
    let token = auth::get_valid_token(&config)?;
    DigikeyClient::new(config, token)
}
