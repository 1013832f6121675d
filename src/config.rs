use chrono::Duration;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::deletion::DEFAULT_GRACE_DAYS;
use crate::ledger::PaymentPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub mongodb_uri: Option<String>,
    pub database_name: String,
    pub bind_address: String,
    pub port: u16,
    pub auth_secret: String,
    pub deletion_grace_days: i64,
    pub payments_require_review: bool,
    pub default_currency: String,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let auth_secret = lookup("AUTH_SECRET").ok_or(ConfigError::Missing("AUTH_SECRET"))?;
        let deletion_grace_days = parse_or(&lookup, "DELETION_GRACE_DAYS", DEFAULT_GRACE_DAYS)?;
        if deletion_grace_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "DELETION_GRACE_DAYS",
                value: deletion_grace_days.to_string(),
            });
        }

        Ok(AppConfig {
            mongodb_uri: lookup("MONGODB_URI"),
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "flatsplit".to_string()),
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            auth_secret,
            deletion_grace_days,
            payments_require_review: parse_or(&lookup, "PAYMENTS_REQUIRE_REVIEW", false)?,
            default_currency: lookup("DEFAULT_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| "EUR".to_string()),
        })
    }

    pub fn deletion_grace(&self) -> Duration {
        Duration::days(self.deletion_grace_days)
    }

    pub fn payment_policy(&self) -> PaymentPolicy {
        PaymentPolicy {
            require_review: self.payments_require_review,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub fn test_config() -> AppConfig {
        AppConfig::from_lookup(|name| (name == "AUTH_SECRET").then(|| "test-secret".to_string()))
            .unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = test_config();
        assert_eq!(config.mongodb_uri, None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.deletion_grace_days, 30);
        assert!(!config.payments_require_review);
        assert_eq!(config.default_currency, "EUR");
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AUTH_SECRET", "x"),
            ("PORT", "9000"),
            ("PAYMENTS_REQUIRE_REVIEW", "true"),
            ("DEFAULT_CURRENCY", "chf"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.payment_policy().require_review);
        assert_eq!(config.default_currency, "CHF");
        assert!(config.mongodb_uri.is_some());
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("AUTH_SECRET"))
        ));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("AUTH_SECRET", "x"), ("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        let err = AppConfig::from_lookup(lookup(&[("AUTH_SECRET", "x"), ("DELETION_GRACE_DAYS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "DELETION_GRACE_DAYS", .. }));
    }
}
