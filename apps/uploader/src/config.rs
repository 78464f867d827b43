//! Uploader configuration.
//!
//! Read from `uploader.json` under the user's config directory:
//! - Linux/macOS: `$XDG_CONFIG_HOME/coachlib/` or `~/.config/coachlib/`
//! - Windows:     `%APPDATA%\coachlib\`
//!
//! Every field is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use coachlib_upload::{RetryPolicy, SchedulerConfig, TimeoutConfig, UploadConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Prefix of the `/upload/...` endpoints.
    pub base_url: String,

    /// Sent as a Bearer token when set.
    pub auth_token: Option<String>,

    pub max_parallel: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub single_put_timeout_secs: u64,
    pub part_put_timeout_secs: u64,
    pub api_timeout_secs: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        let engine = UploadConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            auth_token: None,
            max_parallel: engine.scheduler.max_parallel,
            max_retries: engine.retry.max_retries,
            base_delay_ms: engine.retry.base_delay.as_millis() as u64,
            single_put_timeout_secs: engine.timeouts.single_put.as_secs(),
            part_put_timeout_secs: engine.timeouts.part_put.as_secs(),
            api_timeout_secs: engine.timeouts.api_call.as_secs(),
        }
    }
}

impl UploaderConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults. An unreadable or malformed file
    /// is logged and also yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Self::default(),
            },
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "config loaded");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                Self::default()
            }
        }
    }

    /// Engine settings described by this file.
    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.base_delay_ms),
            },
            scheduler: SchedulerConfig {
                max_parallel: self.max_parallel.max(1),
            },
            timeouts: TimeoutConfig {
                single_put: Duration::from_secs(self.single_put_timeout_secs),
                part_put: Duration::from_secs(self.part_put_timeout_secs),
                api_call: Duration::from_secs(self.api_timeout_secs),
            },
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// `<config dir>/coachlib/uploader.json`.
pub fn default_config_path() -> Option<PathBuf> {
    config_base_dir().map(|d| d.join("coachlib").join("uploader.json"))
}

fn config_base_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(xdg));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    }
}
