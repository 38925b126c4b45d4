use crate::connectors::BackendConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Freshness window for list data (deals, deal pages)
    #[serde(default = "CacheSettings::default_deals_stale_secs")]
    pub deals_stale_secs: u64,
    /// Freshness window for per-user data (the user's own ratings)
    #[serde(default = "CacheSettings::default_user_stale_secs")]
    pub user_stale_secs: u64,
}

impl CacheSettings {
    const fn default_deals_stale_secs() -> u64 {
        120
    }

    const fn default_user_stale_secs() -> u64 {
        30
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            deals_stale_secs: Self::default_deals_stale_secs(),
            user_stale_secs: Self::default_user_stale_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_signup_timeout_secs")]
    pub signup_timeout_secs: u64,
}

impl AuthSettings {
    const fn default_signup_timeout_secs() -> u64 {
        30
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            signup_timeout_secs: Self::default_signup_timeout_secs(),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // configuration.{yaml,toml,json} is optional; OENTEX__BACKEND__BASE_URL style
    // variables override it
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("OENTEX").separator("__"))
        .build()?;

    let mut config: Settings = settings.try_deserialize()?;

    if config.backend.api_key.is_none() {
        config.backend.api_key = std::env::var("OENTEX_BACKEND_KEY").ok();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_freshness_policy() {
        let settings = Settings::default();
        assert_eq!(settings.cache.deals_stale_secs, 120);
        assert_eq!(settings.cache.user_stale_secs, 30);
        assert_eq!(settings.auth.signup_timeout_secs, 30);
        assert!(settings.cache.user_stale_secs < settings.cache.deals_stale_secs);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "backend": { "base_url": "https://example.supabase.co" },
            "cache": { "deals_stale_secs": 60 }
        }))
        .unwrap();

        assert_eq!(settings.backend.base_url, "https://example.supabase.co");
        assert_eq!(settings.backend.timeout_secs, 10);
        assert_eq!(settings.cache.deals_stale_secs, 60);
        assert_eq!(settings.cache.user_stale_secs, 30);
    }
}
