use std::time::Duration;

const fn api_host() -> &'static str {
    if let Some(host) = option_env!("DIRECTIONS_API_HOST") {
        host
    } else {
        "maps.googleapis.com"
    }
}

const fn api_secure() -> bool {
    if let Some(secure) = option_env!("DIRECTIONS_API_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        true
    }
}

const fn api_timeout_secs() -> u64 {
    if let Some(secs) = option_env!("DIRECTIONS_API_TIMEOUT_SECS") {
        const_str::parse!(secs, u64)
    } else {
        10
    }
}

const fn api_proto() -> &'static str {
    if api_secure() { "https" } else { "http" }
}

const API_HOST: &str = api_host();
const API_PROTO: &str = api_proto();
const API_PATH: &str = "/maps/api/directions/json";

pub const DEFAULT_API_URL: &str = const_str::concat!(API_PROTO, "://", API_HOST, API_PATH);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(api_timeout_secs());

/// Baked in key, if one was given at build time
const BUILD_API_KEY: Option<&str> = option_env!("DIRECTIONS_API_KEY");

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where and how to reach the directions API. Defaults come from the build
/// environment (`DIRECTIONS_API_HOST`, `DIRECTIONS_API_SECURE`,
/// `DIRECTIONS_API_TIMEOUT_SECS`, `DIRECTIONS_API_KEY`).
pub struct DirectionsConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl DirectionsConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            api_key: BUILD_API_KEY.map(str::to_string),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
