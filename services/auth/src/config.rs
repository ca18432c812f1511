use chrono::Duration;
use serde::Deserialize;

use timesync_core::Config;

/// Auth service configuration loaded from environment variables. Field
/// names map to upper-cased env var names; serde defaults supply the
/// documented fallbacks, so only `DATABASE_URL` is required.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SMTP relay host. When unset, verification codes are logged instead
    /// of mailed.
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_pass: String,
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,

    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl_hours")]
    pub refresh_ttl_hours: i64,
    #[serde(default = "default_code_ttl_minutes")]
    pub code_ttl_minutes: i64,
    #[serde(default = "default_refresh_grace_seconds")]
    pub refresh_grace_seconds: i64,
    #[serde(default = "default_team_size_limit")]
    pub team_size_limit: i64,

    #[serde(default = "default_request_code_email_limit")]
    pub request_code_email_limit: u32,
    #[serde(default = "default_request_code_email_window_minutes")]
    pub request_code_email_window_minutes: i64,
    #[serde(default = "default_request_code_ip_limit")]
    pub request_code_ip_limit: u32,
    #[serde(default = "default_request_code_ip_window_minutes")]
    pub request_code_ip_window_minutes: i64,

    #[serde(default = "default_verify_code_email_limit")]
    pub verify_code_email_limit: u32,
    #[serde(default = "default_verify_code_email_window_minutes")]
    pub verify_code_email_window_minutes: i64,
    #[serde(default = "default_verify_code_lock_minutes")]
    pub verify_code_lock_minutes: i64,
    #[serde(default = "default_verify_code_ip_limit")]
    pub verify_code_ip_limit: u32,
    #[serde(default = "default_verify_code_ip_window_minutes")]
    pub verify_code_ip_window_minutes: i64,

    #[serde(default = "default_refresh_device_limit")]
    pub refresh_device_limit: u32,
    #[serde(default = "default_refresh_device_window_minutes")]
    pub refresh_device_window_minutes: i64,
}

impl Config for AuthConfig {}

impl AuthConfig {
    /// Resolve raw env values into the durations and limits the flows use.
    pub fn settings(&self) -> Settings {
        Settings {
            access_ttl: Duration::minutes(self.access_ttl_minutes),
            refresh_ttl: Duration::hours(self.refresh_ttl_hours),
            code_ttl: Duration::minutes(self.code_ttl_minutes),
            refresh_grace: Duration::seconds(self.refresh_grace_seconds),
            team_size_limit: self.team_size_limit,
            request_code_email_limit: self.request_code_email_limit,
            request_code_email_window: Duration::minutes(self.request_code_email_window_minutes),
            request_code_ip_limit: self.request_code_ip_limit,
            request_code_ip_window: Duration::minutes(self.request_code_ip_window_minutes),
            verify_code_email_limit: self.verify_code_email_limit,
            verify_code_email_window: Duration::minutes(self.verify_code_email_window_minutes),
            verify_code_lock: Duration::minutes(self.verify_code_lock_minutes),
            verify_code_ip_limit: self.verify_code_ip_limit,
            verify_code_ip_window: Duration::minutes(self.verify_code_ip_window_minutes),
            refresh_device_limit: self.refresh_device_limit,
            refresh_device_window: Duration::minutes(self.refresh_device_window_minutes),
        }
    }
}

/// Resolved operating parameters, shared through app state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub code_ttl: Duration,
    pub refresh_grace: Duration,
    pub team_size_limit: i64,
    pub request_code_email_limit: u32,
    pub request_code_email_window: Duration,
    pub request_code_ip_limit: u32,
    pub request_code_ip_window: Duration,
    pub verify_code_email_limit: u32,
    pub verify_code_email_window: Duration,
    pub verify_code_lock: Duration,
    pub verify_code_ip_limit: u32,
    pub verify_code_ip_window: Duration,
    pub refresh_device_limit: u32,
    pub refresh_device_window: Duration,
}

fn default_port() -> u16 {
    8080
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@timesync".to_owned()
}

fn default_access_ttl_minutes() -> i64 {
    30
}

fn default_refresh_ttl_hours() -> i64 {
    720
}

fn default_code_ttl_minutes() -> i64 {
    10
}

fn default_refresh_grace_seconds() -> i64 {
    30
}

fn default_team_size_limit() -> i64 {
    30
}

fn default_request_code_email_limit() -> u32 {
    3
}

fn default_request_code_email_window_minutes() -> i64 {
    15
}

fn default_request_code_ip_limit() -> u32 {
    10
}

fn default_request_code_ip_window_minutes() -> i64 {
    60
}

fn default_verify_code_email_limit() -> u32 {
    5
}

fn default_verify_code_email_window_minutes() -> i64 {
    15
}

fn default_verify_code_lock_minutes() -> i64 {
    15
}

fn default_verify_code_ip_limit() -> u32 {
    20
}

fn default_verify_code_ip_window_minutes() -> i64 {
    60
}

fn default_refresh_device_limit() -> u32 {
    10
}

fn default_refresh_device_window_minutes() -> i64 {
    1
}
