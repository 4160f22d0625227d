use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub api_rps: u32,
    pub auth_rps: u32,
    pub max_login_attempts: i32,
    pub lockout_minutes: i64,
    pub password_reset_ttl_minutes: i64,
    pub uploads_dir: String,
    pub static_dir: Option<String>,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    /// Read client addresses from `X-Forwarded-For` for rate limiting.
    pub trust_proxy: bool,
    pub frontend_url: String,
    pub smtp: Option<SmtpConfig>,
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS, usually port 587.
    StartTls,
    /// TLS from the first byte, usually port 465.
    Wrapper,
    /// No encryption. Only for local relays such as MailHog.
    None,
}

impl std::str::FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" | "wrapper" => Ok(SmtpTls::Wrapper),
            "none" | "off" => Ok(SmtpTls::None),
            other => Err(format!("expected starttls, tls or none, got '{}'", other)),
        }
    }
}

impl SmtpTls {
    pub fn default_port(&self) -> u16 {
        match self {
            SmtpTls::StartTls => 587,
            SmtpTls::Wrapper => 465,
            SmtpTls::None => 25,
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let smtp = match env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty()) {
            Some(host) => {
                let tls: SmtpTls = get_env_or("SMTP_TLS", SmtpTls::StartTls)?;
                Some(SmtpConfig {
                    host,
                    port: get_env_or("SMTP_PORT", tls.default_port())?,
                    tls,
                    username: env::var("SMTP_USERNAME").ok(),
                    password: env::var("SMTP_PASSWORD").ok(),
                    from: env::var("MAIL_FROM")
                        .unwrap_or_else(|_| "Careers <careers@localhost>".to_string()),
                })
            }
            None => None,
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_expires_in_hours: get_env_or("JWT_EXPIRES_IN_HOURS", 24)?,
            api_rps: get_env_or("API_RPS", 50)?,
            auth_rps: get_env_or("AUTH_RPS", 10)?,
            max_login_attempts: get_env_or("MAX_LOGIN_ATTEMPTS", 5)?,
            lockout_minutes: get_env_or("LOCKOUT_MINUTES", 120)?,
            password_reset_ttl_minutes: get_env_or("PASSWORD_RESET_TTL_MINUTES", 60)?,
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            static_dir: env::var("STATIC_DIR").ok().filter(|d| !d.trim().is_empty()),
            max_upload_bytes: get_env_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            cors_origins: parse_list(&env::var("CORS_ORIGINS").unwrap_or_default()),
            trust_proxy: get_env_or("TRUST_PROXY", false)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            smtp,
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_drops_blank_entries() {
        assert_eq!(
            parse_list(" https://a.example , ,https://b.example"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn smtp_tls_modes() {
        assert_eq!("STARTTLS".parse::<SmtpTls>().unwrap(), SmtpTls::StartTls);
        assert_eq!("tls".parse::<SmtpTls>().unwrap(), SmtpTls::Wrapper);
        assert_eq!("none".parse::<SmtpTls>().unwrap(), SmtpTls::None);
        assert!("ssl3".parse::<SmtpTls>().is_err());
        assert_eq!(SmtpTls::StartTls.default_port(), 587);
    }
}
