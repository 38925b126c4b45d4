use serde::{Deserialize, Serialize};

/// Hosted backend (PostgREST + auth) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. https://<project>.supabase.co
    #[serde(default = "BackendConfig::default_base_url")]
    pub base_url: String,
    /// Public API key sent as `apikey` (falls back to OENTEX_BACKEND_KEY env)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Signed-in user's access token, set at runtime
    #[serde(skip)]
    pub access_token: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "BackendConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts for idempotent reads; writes are never retried
    #[serde(default = "BackendConfig::default_retry_attempts")]
    pub retry_attempts: usize,
}

impl BackendConfig {
    fn default_base_url() -> String {
        "http://localhost:54321".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        10
    }

    const fn default_retry_attempts() -> usize {
        3
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: None,
            access_token: None,
            timeout_secs: Self::default_timeout_secs(),
            retry_attempts: Self::default_retry_attempts(),
        }
    }
}
