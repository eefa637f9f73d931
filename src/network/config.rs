use std::cell::RefCell;

use crate::constants::DEFAULT_API_BASE_URL;

/// API route configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ApiConfig {
    base_url: String,
}

impl Default for ApiConfig {
    /// Local development backend. Used until `init_api_config` runs and in
    /// native unit tests.
    fn default() -> Self {
        Self::from_url(DEFAULT_API_BASE_URL)
    }
}

impl ApiConfig {
    /// Create a new ApiConfig from the API_BASE_URL build-time variable
    pub fn new() -> Result<Self, &'static str> {
        if let Some(url) = option_env!("API_BASE_URL") {
            Ok(Self::from_url(url))
        } else {
            Err("API_BASE_URL environment variable is not set")
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full REST URL for a path below `/api/v1`, e.g. `url("/workflows")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Per-user live channel endpoint, `ws(s)://host/ws/{user_id}`.
    pub fn ws_url(&self, user_id: &str) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/ws/{}", ws_base, user_id)
    }
}

thread_local! {
    static API_CONFIG: RefCell<ApiConfig> = RefCell::new(ApiConfig::new().unwrap_or_default());
}

/// Replace the active configuration (runtime override from JS).
pub fn set_api_config(config: ApiConfig) {
    log::info!("API base URL set to {}", config.base_url());
    API_CONFIG.with(|cell| *cell.borrow_mut() = config);
}

pub fn api_config() -> ApiConfig {
    API_CONFIG.with(|cell| cell.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_under_api_v1() {
        let config = ApiConfig::from_url("https://console.example.com/");
        assert_eq!(config.url("/workflows"), "https://console.example.com/api/v1/workflows");
        assert_eq!(config.ws_url("42"), "wss://console.example.com/ws/42");
    }

    #[test]
    fn plain_http_maps_to_ws() {
        assert_eq!(ApiConfig::default().ws_url("7"), "ws://localhost:8000/ws/7");
    }

    #[test]
    fn runtime_override_wins() {
        set_api_config(ApiConfig::from_url("http://10.0.0.5:9000"));
        assert_eq!(api_config().base_url(), "http://10.0.0.5:9000");
    }
}
