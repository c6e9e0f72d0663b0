// src/config.rs

//! Application configuration structures.
//!
//! Loaded once from a TOML file before the scheduler starts; the site list
//! is not hot-reloaded.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Site;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Scheduler loop behavior
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Lightweight HTTP fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Headless browser settings for script-rendered pages
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Change notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Liveness endpoint settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Sites to monitor
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.prefix_bytes == 0 {
            return Err(AppError::validation("fetch.prefix_bytes must be > 0"));
        }
        if self.browser.page_timeout_secs == 0 {
            return Err(AppError::validation(
                "browser.page_timeout_secs must be > 0",
            ));
        }
        if self.browser.prefix_bytes == 0 {
            return Err(AppError::validation("browser.prefix_bytes must be > 0"));
        }
        if self.monitor.round_floor_secs == 0 {
            return Err(AppError::validation("monitor.round_floor_secs must be > 0"));
        }
        if self.sites.is_empty() {
            return Err(AppError::validation("No sites defined"));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            if site.name.trim().is_empty() {
                return Err(AppError::validation("site name is empty"));
            }
            if site.interval_secs == 0 {
                return Err(AppError::validation(format!(
                    "site '{}': interval_secs must be > 0",
                    site.name
                )));
            }
            url::Url::parse(&site.url).map_err(|e| {
                AppError::validation(format!("site '{}': invalid url: {}", site.name, e))
            })?;
            if !names.insert(site.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate site name '{}'",
                    site.name
                )));
            }
        }
        Ok(())
    }
}

/// Scheduler loop behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Minimum sleep between scheduling rounds in seconds
    #[serde(default = "defaults::round_floor")]
    pub round_floor_secs: u64,

    /// Pause between successive site checks within a round in milliseconds
    #[serde(default = "defaults::check_pause")]
    pub pause_between_checks_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            round_floor_secs: defaults::round_floor(),
            pause_between_checks_ms: defaults::check_pause(),
        }
    }
}

/// Lightweight HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Fingerprint prefix length in bytes for conditional fetches
    #[serde(default = "defaults::fetch_prefix")]
    pub prefix_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            prefix_bytes: defaults::fetch_prefix(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Page load timeout in seconds
    #[serde(default = "defaults::page_timeout")]
    pub page_timeout_secs: u64,

    /// Settle delay after page load in milliseconds, so deferred scripts
    /// can populate content before the document is read
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    /// Fingerprint prefix length in bytes for rendered fetches
    #[serde(default = "defaults::browser_prefix")]
    pub prefix_bytes: usize,

    /// Browser window width
    #[serde(default = "defaults::window_width")]
    pub window_width: u32,

    /// Browser window height
    #[serde(default = "defaults::window_height")]
    pub window_height: u32,

    /// Path to the Chromium/Chrome executable; autodetected when unset
    #[serde(default)]
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: defaults::page_timeout(),
            settle_delay_ms: defaults::settle_delay(),
            prefix_bytes: defaults::browser_prefix(),
            window_width: defaults::window_width(),
            window_height: defaults::window_height(),
            executable: None,
        }
    }
}

/// Change notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Webhook URL to POST change events to; log-only when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Liveness endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Whether to run the keep-alive responder
    #[serde(default = "defaults::server_enabled")]
    pub enabled: bool,

    /// Bind address
    #[serde(default = "defaults::server_bind")]
    pub bind: String,

    /// Bind port
    #[serde(default = "defaults::server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::server_enabled(),
            bind: defaults::server_bind(),
            port: defaults::server_port(),
        }
    }
}

mod defaults {
    // Monitor defaults
    pub fn round_floor() -> u64 {
        5
    }
    pub fn check_pause() -> u64 {
        2000
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitewatch/0.1)".into()
    }
    pub fn fetch_timeout() -> u64 {
        20
    }
    pub fn fetch_prefix() -> usize {
        5000
    }

    // Browser defaults
    pub fn page_timeout() -> u64 {
        30
    }
    pub fn settle_delay() -> u64 {
        1000
    }
    pub fn browser_prefix() -> usize {
        10000
    }
    pub fn window_width() -> u32 {
        1200
    }
    pub fn window_height() -> u32 {
        800
    }

    // Server defaults
    pub fn server_enabled() -> bool {
        true
    }
    pub fn server_bind() -> String {
        "0.0.0.0".into()
    }
    pub fn server_port() -> u16 {
        8080
    }
}
