use std::env;

use thiserror::Error;

use crate::auth::ServiceAccount;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://www.peaceinpoetry.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set in the environment")]
    Missing(&'static str),

    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the process needs at startup, validated before the server
/// binds. A missing or malformed service-account key refuses to start
/// instead of failing on the first request.
pub struct Config {
    pub port: u16,
    pub allowed_origin: String,
    pub service_account: ServiceAccount,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = env::var("GOOGLE_SERVICE_ACCOUNT_KEY")
            .map_err(|_| ConfigError::Missing("GOOGLE_SERVICE_ACCOUNT_KEY"))?;
        let service_account =
            ServiceAccount::from_json(&key).map_err(|err| ConfigError::Invalid {
                name: "GOOGLE_SERVICE_ACCOUNT_KEY",
                reason: err.to_string(),
            })?;
        Ok(Config {
            port: parse_port(env::var("PORT").ok())?,
            allowed_origin: env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.to_owned()),
            service_account,
        })
    }
}

fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    match raw {
        None => Ok(DEFAULT_PORT),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            reason: format!("{raw:?} is not a port number"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_to_3000() {
        assert_eq!(parse_port(None).unwrap(), 3000);
    }

    #[test]
    fn port_parses_from_a_decimal_string() {
        assert_eq!(parse_port(Some("8080".to_owned())).unwrap(), 8080);
    }

    #[test]
    fn non_numeric_port_is_a_typed_error() {
        assert!(matches!(
            parse_port(Some("three thousand".to_owned())).unwrap_err(),
            ConfigError::Invalid { name: "PORT", .. }
        ));
    }
}
