//! Gateway endpoint configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Direction, SiiError};

/// Environment variable selecting the AEAT test environment (`true`/`false`).
pub const ENV_TEST: &str = "AEAT_SII_TEST";
/// Environment variable overriding the HTTP timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "AEAT_SII_TIMEOUT_SECS";

const TEST_HOST: &str = "https://prewww1.aeat.es";
const PRODUCTION_HOST: &str = "https://www1.agenciatributaria.gob.es";
const ISSUED_PATH: &str = "/wlpl/SSII-FACT/ws/fe/SiiFactFEV1SOAP";
const RECEIVED_PATH: &str = "/wlpl/SSII-FACT/ws/fr/SiiFactFRV1SOAP";

/// AEAT environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Production,
}

/// Configuration for the SII gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Test unless explicitly switched to production.
    pub environment: Environment,
    /// Whole-request HTTP timeout.
    pub timeout: Duration,
    /// Replaces the environment's host, e.g. for a local stub.
    pub base_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            timeout: Duration::from_secs(30),
            base_url: None,
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `AEAT_SII_TEST` and `AEAT_SII_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, SiiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SiiError> {
        let mut builder = GatewayConfigBuilder::new();
        if let Some(value) = lookup(ENV_TEST) {
            let test = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(SiiError::Config(format!(
                        "{ENV_TEST} must be a boolean, got '{other}'"
                    )));
                }
            };
            builder = builder.test(test);
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = value.trim().parse().map_err(|_| {
                SiiError::Config(format!("{ENV_TIMEOUT_SECS} must be whole seconds, got '{value}'"))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }

    pub fn is_test(&self) -> bool {
        self.environment == Environment::Test
    }

    /// SOAP endpoint for invoices of `direction`.
    pub fn endpoint(&self, direction: Direction) -> String {
        let host = self.base_url.as_deref().unwrap_or(match self.environment {
            Environment::Test => TEST_HOST,
            Environment::Production => PRODUCTION_HOST,
        });
        let path = match direction {
            Direction::Issued => ISSUED_PATH,
            Direction::Received => RECEIVED_PATH,
        };
        format!("{}{path}", host.trim_end_matches('/'))
    }
}

/// Builder for [`GatewayConfig`].
///
/// ```
/// use aeat_sii::gateway::GatewayConfigBuilder;
/// use std::time::Duration;
///
/// let config = GatewayConfigBuilder::new()
///     .test(false)
///     .timeout(Duration::from_secs(60))
///     .build();
/// assert!(!config.is_test());
/// ```
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    /// `true` for the AEAT test environment.
    pub fn test(self, test: bool) -> Self {
        self.environment(if test {
            Environment::Test
        } else {
            Environment::Production
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_test_environment() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.is_test());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.endpoint(Direction::Issued).starts_with("https://prewww1.aeat.es/"));
    }

    #[test]
    fn env_switches_to_production() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (ENV_TEST, "false"),
            (ENV_TIMEOUT_SECS, "90"),
        ]))
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(
            config.endpoint(Direction::Received),
            "https://www1.agenciatributaria.gob.es/wlpl/SSII-FACT/ws/fr/SiiFactFRV1SOAP"
        );
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(GatewayConfig::from_lookup(lookup(&[(ENV_TEST, "maybe")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "1m")])).is_err());
    }

    #[test]
    fn base_url_override() {
        let config = GatewayConfigBuilder::new()
            .base_url("http://localhost:8080/")
            .build();
        assert_eq!(
            config.endpoint(Direction::Issued),
            "http://localhost:8080/wlpl/SSII-FACT/ws/fe/SiiFactFEV1SOAP"
        );
    }
}
