use chrono::Duration;
use serde::Deserialize;
use std::env;

use perch_domain::{OperatingWindow, ReservationPolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub reservation: ReservationRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// 32-byte AES-256 key, standard base64. Feed it to
    /// `TokenMinter::from_base64`. Shared with the device token
    /// minting elsewhere on the platform.
    pub key: String,
}

/// Business rules for the reservation engine. Minutes and hours so the
/// file reads like the operations runbook.
#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    #[serde(default = "default_buffer_minutes")]
    pub handoff_buffer_minutes: i64,
    #[serde(default = "default_open_hour")]
    pub window_open_hour: i64,
    #[serde(default = "default_close_hour")]
    pub window_close_hour: i64,
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_minutes: i64,
    #[serde(default = "default_page_size")]
    pub history_page_size: u32,
}

fn default_duration_minutes() -> i64 {
    70
}
fn default_buffer_minutes() -> i64 {
    5
}
fn default_open_hour() -> i64 {
    8
}
fn default_close_hour() -> i64 {
    24
}
fn default_nonce_ttl() -> i64 {
    30
}
fn default_page_size() -> u32 {
    20
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration_minutes(),
            handoff_buffer_minutes: default_buffer_minutes(),
            window_open_hour: default_open_hour(),
            window_close_hour: default_close_hour(),
            nonce_ttl_minutes: default_nonce_ttl(),
            history_page_size: default_page_size(),
        }
    }
}

impl From<&ReservationRules> for ReservationPolicy {
    fn from(rules: &ReservationRules) -> Self {
        Self {
            default_duration: Duration::minutes(rules.default_duration_minutes),
            window: OperatingWindow::new(
                rules.window_open_hour,
                rules.window_close_hour,
                rules.handoff_buffer_minutes,
            ),
            nonce_ttl: Duration::minutes(rules.nonce_ttl_minutes),
            history_page_size: rules.history_page_size,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // `PERCH__DATABASE__URL=...` style environment overrides.
            .add_source(config::Environment::with_prefix("PERCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
