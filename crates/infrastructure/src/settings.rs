use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpSettings {
    /// Per-request timeout toward devices (seconds)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_http_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriftSettings {
    /// Bound on concurrently-checked devices in a bulk run; the detector
    /// itself imposes none.
    #[serde(default = "default_drift_concurrency")]
    pub max_concurrency: usize,
}

fn default_drift_concurrency() -> usize {
    16
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolutionSettings {
    #[serde(default = "default_policy_ttl")]
    pub policy_cache_ttl_secs: u64,
}

fn default_policy_ttl() -> u64 {
    300
}

/// Operator-side settings for the fleet manager process.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default = "default_http_settings")]
    pub http: HttpSettings,
    #[serde(default = "default_drift_settings")]
    pub drift: DriftSettings,
    #[serde(default = "default_resolution_settings")]
    pub resolution: ResolutionSettings,
}

fn default_http_settings() -> HttpSettings {
    HttpSettings {
        timeout_secs: default_http_timeout(),
    }
}

fn default_drift_settings() -> DriftSettings {
    DriftSettings {
        max_concurrency: default_drift_concurrency(),
    }
}

fn default_resolution_settings() -> ResolutionSettings {
    ResolutionSettings {
        policy_cache_ttl_secs: default_policy_ttl(),
    }
}

impl Settings {
    /// Defaults, then `<dir>/default` and `<dir>/<RUN_MODE>` files, then
    /// environment variables (e.g. `FLEET__DATABASE__URL=...`).
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings = Config::builder()
            .set_default("database.url", "postgres://localhost/fleet")?
            .set_default("database.max_connections", 5)?
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            .add_source(Environment::with_prefix("FLEET").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
