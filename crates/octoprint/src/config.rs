use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use printdeck_core::FilamentProfile;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};

/// Default base URL of the OctoPrint REST API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/";

/// Default delay between two status polls.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(2000);

/// Default timeout for a single HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings the sync core reads from its host application.
///
/// Values are read on every use, so an implementation may change them at
/// runtime (the poller picks up a new interval on its next cycle).
pub trait ConfigProvider: Send + Sync {
    fn polling_interval(&self) -> Duration;

    /// Headers attached to every request (API key, cache busting).
    fn request_headers(&self) -> HeaderMap;

    /// Absolute URL of an API path such as `"job"` or `"files/local/parts"`.
    fn url(&self, path: &str) -> String;

    fn notifications_muted(&self) -> bool;

    fn filament(&self) -> FilamentProfile;

    fn request_timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Printer server connection settings.
///
/// Loaded from environment variables by [`EnvConfig::from_env`]; the polling
/// interval and mute flag can be changed afterwards.
#[derive(Debug)]
pub struct EnvConfig {
    base_url: String,
    headers: HeaderMap,
    polling_interval_ms: AtomicU64,
    notifications_muted: AtomicBool,
    filament: FilamentProfile,
    request_timeout: Duration,
}

impl EnvConfig {
    /// Build a config for `base_url` authenticated with `api_key`.
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Result<Self, ConfigError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url,
            headers: build_headers(api_key)?,
            polling_interval_ms: AtomicU64::new(DEFAULT_POLLING_INTERVAL.as_millis() as u64),
            notifications_muted: AtomicBool::new(false),
            filament: FilamentProfile::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                      |
    /// |------------------------|------------------------------|
    /// | `OCTOPRINT_URL`        | `http://localhost:5000/api/` |
    /// | `OCTOPRINT_API_KEY`    | required                     |
    /// | `POLLING_INTERVAL_MS`  | `2000`                       |
    /// | `FILAMENT_THICKNESS`   | `1.75`                       |
    /// | `FILAMENT_DENSITY`     | `1.25`                       |
    /// | `NOTIFICATIONS_MUTED`  | `false`                      |
    /// | `REQUEST_TIMEOUT_SECS` | `10`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("OCTOPRINT_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let api_key = std::env::var("OCTOPRINT_API_KEY")
            .map_err(|_| ConfigError::Missing("OCTOPRINT_API_KEY"))?;

        let defaults = FilamentProfile::default();
        let filament = FilamentProfile {
            diameter_mm: parse_var("FILAMENT_THICKNESS", defaults.diameter_mm)?,
            density_g_cm3: parse_var("FILAMENT_DENSITY", defaults.density_g_cm3)?,
        };

        let config = Self::new(base_url, &api_key)?
            .with_polling_interval(Duration::from_millis(parse_var(
                "POLLING_INTERVAL_MS",
                DEFAULT_POLLING_INTERVAL.as_millis() as u64,
            )?))
            .with_filament(filament)
            .with_request_timeout(Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )?));
        config.set_notifications_muted(parse_var("NOTIFICATIONS_MUTED", false)?);

        Ok(config)
    }

    pub fn with_polling_interval(self, interval: Duration) -> Self {
        self.set_polling_interval(interval);
        self
    }

    pub fn with_filament(mut self, filament: FilamentProfile) -> Self {
        self.filament = filament;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Change the polling interval; takes effect from the next cycle.
    pub fn set_polling_interval(&self, interval: Duration) {
        self.polling_interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_notifications_muted(&self, muted: bool) {
        self.notifications_muted.store(muted, Ordering::Relaxed);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ConfigProvider for EnvConfig {
    fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms.load(Ordering::Relaxed))
    }

    fn request_headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn notifications_muted(&self) -> bool {
        self.notifications_muted.load(Ordering::Relaxed)
    }

    fn filament(&self) -> FilamentProfile {
        self.filament
    }

    fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

fn build_headers(api_key: &str) -> Result<HeaderMap, ConfigError> {
    let key = HeaderValue::from_str(api_key).map_err(|_| ConfigError::Invalid {
        var: "OCTOPRINT_API_KEY",
        value: api_key.to_string(),
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("x-api-key"), key);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    Ok(headers)
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
