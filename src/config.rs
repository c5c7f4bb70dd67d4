use std::str::FromStr;

use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Outbound mail account used by the mail worker.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host_user: String,
    pub smtp: String,
    pub smtp_port: u16,
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_exp_hours: i64,
    pub jwt_algorithm: Algorithm,
    pub admin_key: Option<String>,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let port = parse_number(required("PORT")?, "PORT")?;
        let jwt_exp_hours = match lookup("JWT_EXP") {
            Some(raw) => parse_number(raw, "JWT_EXP")?,
            None => 24,
        };
        let jwt_algorithm = parse_algorithm(lookup("JWT_ALGO").as_deref().unwrap_or("HS256"))?;
        let smtp_port = match lookup("SMTP_PORT") {
            Some(raw) => parse_number(raw, "SMTP_PORT")?,
            None => 465,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            base_url: required("BASE_URL")?,
            port,
            jwt_secret: required("JWT_SECRET")?,
            jwt_exp_hours,
            jwt_algorithm,
            admin_key: lookup("ADMIN_KEY").filter(|key| !key.is_empty()),
            mail: MailConfig {
                host_user: required("EMAIL_HOST_USER")?,
                smtp: required("SMTP")?,
                smtp_port,
            },
        })
    }

    /// Base for links sent out by mail, e.g. `http://localhost:8000`.
    pub fn public_url(&self) -> String {
        format!("{}:{}", self.base_url.trim_end_matches('/'), self.port)
    }
}

fn parse_number<T>(raw: String, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

// Tokens are signed with a shared secret, so only the HMAC family applies.
fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(raw.trim()).map_err(|e| ConfigError::Invalid {
        key: "JWT_ALGO",
        reason: e.to_string(),
    })?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(ConfigError::Invalid {
            key: "JWT_ALGO",
            reason: format!("{other:?} needs a key pair, expected HS256, HS384 or HS512"),
        }),
    }
}
