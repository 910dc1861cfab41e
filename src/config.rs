// Application settings loaded with the 'config' crate and 'dotenv'

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    pub api: ApiSettings,
    pub images: ImageSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
    pub fallback: FallbackSettings,
    // Where tokens and the cached user profile are persisted
    pub storage_path: String,
    // Google sign-in is configured only; no flow is driven from here
    pub google_web_client_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    // Tried in order when an image fails to load
    pub cdn_origins: Vec<String>,
    pub placeholder_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub refresh_interval_secs: u64,
    pub refresh_retry_delay_secs: u64,
    pub max_refresh_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub brands_ttl_secs: u64,
    pub popular_ttl_secs: u64,
    pub new_arrivals_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSettings {
    pub use_mock_catalog: bool,
    // Brands that always get synthetic listings when a filter on them finds nothing
    pub guaranteed_brands: Vec<String>,
}

impl SessionSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_retry_delay_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 25 * 60,
            refresh_retry_delay_secs: 5,
            max_refresh_attempts: 3,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            brands_ttl_secs: 30 * 60,
            popular_ttl_secs: 10 * 60,
            new_arrivals_ttl_secs: 5 * 60,
        }
    }
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            use_mock_catalog: true,
            guaranteed_brands: vec!["BYD".to_string()],
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("storage_path", "showroom_store.json")?
            .set_default("api.base_url", "https://api.example-dealer.com/api")?
            .set_default("api.page_size", 20)?
            .set_default("api.timeout_secs", 20)?
            .set_default("images.cdn_origins", vec!["https://cdn.example-dealer.com"])?
            .set_default("images.placeholder_uri", "/static/car-placeholder.png")?
            .set_default("session.refresh_interval_secs", 25 * 60)?
            .set_default("session.refresh_retry_delay_secs", 5)?
            .set_default("session.max_refresh_attempts", 3)?
            .set_default("cache.brands_ttl_secs", 30 * 60)?
            .set_default("cache.popular_ttl_secs", 10 * 60)?
            .set_default("cache.new_arrivals_ttl_secs", 5 * 60)?
            .set_default("fallback.use_mock_catalog", true)?
            .set_default("fallback.guaranteed_brands", vec!["BYD"])?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_API__BASE_URL)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("images.cdn_origins")
                    .with_list_parse_key("fallback.guaranteed_brands")
                    .try_parsing(true),
            );

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Settings pointing at a given API origin, used by tests and local tooling.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            server_address: "127.0.0.1:0".to_string(),
            api: ApiSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: Some("test-api-key".to_string()),
                page_size: 20,
                timeout_secs: 5,
            },
            images: ImageSettings {
                cdn_origins: vec!["https://cdn.example-dealer.com".to_string()],
                placeholder_uri: "/static/car-placeholder.png".to_string(),
            },
            session: SessionSettings::default(),
            cache: CacheSettings::default(),
            fallback: FallbackSettings::default(),
            storage_path: "showroom_store.json".to_string(),
            google_web_client_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults_refresh_before_token_lifetime() {
        let session = SessionSettings::default();
        assert_eq!(session.refresh_interval(), Duration::from_secs(1500));
        assert_eq!(session.retry_delay(), Duration::from_secs(5));
        assert_eq!(session.max_refresh_attempts, 3);
    }

    #[test]
    fn for_base_url_strips_trailing_slash() {
        let settings = Settings::for_base_url("http://localhost:9999/");
        assert_eq!(settings.api.base_url, "http://localhost:9999");
        assert_eq!(settings.fallback.guaranteed_brands, vec!["BYD".to_string()]);
    }
}
