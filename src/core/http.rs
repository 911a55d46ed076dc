use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;

use crate::core::error::{PackError, PackResult};

const APP_USER_AGENT: &str = concat!("mcpack/", env!("CARGO_PKG_VERSION"));

/// Environment variable carrying the pre-shared CurseForge API key.
pub const API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

pub fn api_key_from_env() -> PackResult<String> {
    std::env::var(API_KEY_ENV).map_err(|_| {
        PackError::Other(format!("{API_KEY_ENV} is not set in the environment"))
    })
}

/// Build the shared HTTP client with the API key and user agent attached
/// as default headers. Every catalog request goes through this client.
pub fn build_http_client(api_key: &str) -> PackResult<Client> {
    let mut default_headers = HeaderMap::new();
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| PackError::Other("API key contains invalid header characters".into()))?;
    key.set_sensitive(true);
    default_headers.insert("x-api-key", key);

    Ok(Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()?)
}
