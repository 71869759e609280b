use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, ensure};
use serde::Deserialize;

/// Longest accepted token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC key shared by session and reset tokens. `None` means token
    /// operations fail with a configuration error instead of issuing anything.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub reset_audience: String,
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// TLS from the first byte, usually port 465.
    Implicit,
    /// Plaintext greeting upgraded with STARTTLS, usually port 587.
    StartTls,
    /// No encryption. Local relays and tests only.
    None,
}

impl SmtpTls {
    pub fn for_port(port: u16) -> Self {
        if port == 465 {
            Self::Implicit
        } else {
            Self::StartTls
        }
    }
}

impl FromStr for SmtpTls {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "implicit" | "tls" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            other => bail!("SMTP_TLS must be implicit, starttls or none, got {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub app_host: String,
    pub app_port: u16,
    pub cors_allow_all: bool,
    /// Use the conditional `used = false -> true` update when consuming reset tokens.
    pub reset_exclusive_consume: bool,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn ttl_minutes(name: &str, default: i64) -> anyhow::Result<i64> {
    let Some(raw) = non_empty(name) else {
        return Ok(default);
    };
    let minutes: i64 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("{name} must be a whole number of minutes, got {raw:?}"))?;
    ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{name} must be between 1 and {MAX_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(false)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: non_empty("JWT_SECRET").or_else(|| non_empty("JWT_KEY")),
            issuer: var_or("JWT_ISSUER", "gatekeep"),
            audience: var_or("JWT_AUDIENCE", "gatekeep"),
            reset_audience: var_or("JWT_RESET_AUDIENCE", "gatekeep-reset"),
            ttl_minutes: ttl_minutes("JWT_TTL_MINUTES", 60 * 24)?,
            reset_ttl_minutes: ttl_minutes("JWT_RESET_TTL_MINUTES", 60 * 24)?,
        };
        let port = parsed_or("SMTP_PORT", 587);
        let tls = match non_empty("SMTP_TLS") {
            Some(raw) => raw.parse()?,
            None => SmtpTls::for_port(port),
        };
        let smtp = SmtpConfig {
            host: var_or("SMTP_HOST", "localhost"),
            port,
            tls,
            username: non_empty("SMTP_USER"),
            password: non_empty("SMTP_PASS"),
            sender: non_empty("SMTP_SENDER_ADDR"),
            template_path: non_empty("TEMPLATE_FILE_PATH").map(PathBuf::from),
        };
        Ok(Self {
            database_url,
            app_host: var_or("APP_HOST", "0.0.0.0"),
            app_port: parsed_or("APP_PORT", 8080),
            cors_allow_all: flag("CORS_ALLOW_ALL"),
            reset_exclusive_consume: flag("RESET_EXCLUSIVE_CONSUME"),
            jwt,
            smtp,
        })
    }
}
