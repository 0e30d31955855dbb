use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::keys::KeyMode;
use crate::error::ConfigError;

pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: IpAddr,
    pub server_port: u16,
    pub api_prefix: String,
    pub admin_prefix: String,
    pub static_dir: Option<String>,
    pub compression_enabled: bool,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub cache_remove_empty_fields: bool,
    pub cache_key_mode: KeyMode,
    pub cache_max_body_bytes: usize,
    pub rate_limit_interval_ms: u64,
    pub rate_limit_default: u32,
    pub rate_limit_api: u32,
    pub rate_limit_admin: u32,
    pub rate_limit_trust_proxy: bool,
    pub contact_rate_limit_interval_ms: u64,
    pub contact_rate_limit_max: u32,
    pub sweep_interval_ms: u64,
    pub smtp: Option<SmtpConfig>,
}

/// Outbound mail for contact submissions. Present only when `SMTP_HOST` is set.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server_port: 1337,
            api_prefix: "/api".into(),
            admin_prefix: "/admin".into(),
            static_dir: None,
            compression_enabled: true,
            cache_enabled: true,
            cache_ttl_ms: 300_000,
            cache_remove_empty_fields: true,
            cache_key_mode: KeyMode::Raw,
            cache_max_body_bytes: 2 * 1024 * 1024,
            rate_limit_interval_ms: 60_000,
            rate_limit_default: 1000,
            rate_limit_api: 100,
            rate_limit_admin: 500,
            rate_limit_trust_proxy: false,
            contact_rate_limit_interval_ms: 15 * 60 * 1000,
            contact_rate_limit_max: 3,
            sweep_interval_ms: 60_000,
            smtp: None,
        }
    }
}

impl Config {
    /// Reads the environment (and `.env` if present). Unset variables take the
    /// defaults; set but malformed ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let config = Config {
            server_host: parse_var(&lookup, "SERVER_HOST", d.server_host)?,
            server_port: parse_var(&lookup, "SERVER_PORT", d.server_port)?,
            api_prefix: lookup("API_PREFIX").unwrap_or(d.api_prefix),
            admin_prefix: lookup("ADMIN_PREFIX").unwrap_or(d.admin_prefix),
            static_dir: lookup("STATIC_DIR").filter(|s| !s.trim().is_empty()),
            compression_enabled: parse_var(&lookup, "COMPRESSION_ENABLED", d.compression_enabled)?,
            cache_enabled: parse_var(&lookup, "CACHE_ENABLED", d.cache_enabled)?,
            cache_ttl_ms: parse_var(&lookup, "CACHE_TTL_MS", d.cache_ttl_ms)?,
            cache_remove_empty_fields: parse_var(
                &lookup,
                "CACHE_REMOVE_EMPTY_FIELDS",
                d.cache_remove_empty_fields,
            )?,
            cache_key_mode: parse_var(&lookup, "CACHE_KEY_MODE", d.cache_key_mode)?,
            cache_max_body_bytes: parse_var(&lookup, "CACHE_MAX_BODY_BYTES", d.cache_max_body_bytes)?,
            rate_limit_interval_ms: parse_var(
                &lookup,
                "RATE_LIMIT_INTERVAL_MS",
                d.rate_limit_interval_ms,
            )?,
            rate_limit_default: parse_var(&lookup, "RATE_LIMIT_DEFAULT", d.rate_limit_default)?,
            rate_limit_api: parse_var(&lookup, "RATE_LIMIT_API", d.rate_limit_api)?,
            rate_limit_admin: parse_var(&lookup, "RATE_LIMIT_ADMIN", d.rate_limit_admin)?,
            rate_limit_trust_proxy: parse_var(
                &lookup,
                "RATE_LIMIT_TRUST_PROXY",
                d.rate_limit_trust_proxy,
            )?,
            contact_rate_limit_interval_ms: parse_var(
                &lookup,
                "CONTACT_RATE_LIMIT_INTERVAL_MS",
                d.contact_rate_limit_interval_ms,
            )?,
            contact_rate_limit_max: parse_var(
                &lookup,
                "CONTACT_RATE_LIMIT_MAX",
                d.contact_rate_limit_max,
            )?,
            sweep_interval_ms: parse_var(&lookup, "SWEEP_INTERVAL_MS", d.sweep_interval_ms)?,
            smtp: smtp_from_lookup(&lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_prefix("API_PREFIX", &self.api_prefix)?;
        check_prefix("ADMIN_PREFIX", &self.admin_prefix)?;
        if let Some(smtp) = &self.smtp {
            check_mailbox("CONTACT_EMAIL_FROM", &smtp.from)?;
            check_mailbox("CONTACT_EMAIL_TO", &smtp.to)?;
            if smtp.port == 0 {
                return Err(ConfigError::NotPositive { name: "SMTP_PORT" });
            }
        }

        let positive = [
            ("CACHE_TTL_MS", self.cache_ttl_ms),
            ("CACHE_MAX_BODY_BYTES", self.cache_max_body_bytes as u64),
            ("RATE_LIMIT_INTERVAL_MS", self.rate_limit_interval_ms),
            ("RATE_LIMIT_DEFAULT", u64::from(self.rate_limit_default)),
            ("RATE_LIMIT_API", u64::from(self.rate_limit_api)),
            ("RATE_LIMIT_ADMIN", u64::from(self.rate_limit_admin)),
            (
                "CONTACT_RATE_LIMIT_INTERVAL_MS",
                self.contact_rate_limit_interval_ms,
            ),
            ("CONTACT_RATE_LIMIT_MAX", u64::from(self.contact_rate_limit_max)),
            ("SWEEP_INTERVAL_MS", self.sweep_interval_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive { name });
            }
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
    }
}

fn smtp_from_lookup<F>(lookup: &F) -> Result<Option<SmtpConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(host) = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty()) else {
        return Ok(None);
    };
    let required = |name: &'static str| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing { name })
    };

    Ok(Some(SmtpConfig {
        host,
        port: parse_var(lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
        username: lookup("SMTP_USERNAME").filter(|v| !v.is_empty()),
        password: lookup("SMTP_PASSWORD").filter(|v| !v.is_empty()),
        from: required("CONTACT_EMAIL_FROM")?,
        to: required("CONTACT_EMAIL_TO")?,
    }))
}

fn check_prefix(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() < 2 || !value.starts_with('/') || value.ends_with('/') {
        return Err(ConfigError::BadPrefix {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_mailbox(name: &'static str, value: &str) -> Result<(), ConfigError> {
    value
        .parse::<lettre::message::Mailbox>()
        .map(|_| ())
        .map_err(|_| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}
