use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use health::ProbePolicy;
use redis::IntoConnectionInfo;
use store::RedisOptions;
use thiserror::Error;

/// Configuration loaded from the environment.
///
/// Store URIs carry credentials: they are wrapped in [`Redacted`] so that they
/// never show up in `Debug` output, logs or configuration errors.
#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    /// Comma-separated list for a cluster of ingress nodes.
    #[envconfig(from = "REDIS_URI_INGRESS")]
    pub redis_uri_ingress: StoreUris,

    /// Separate rate-limit store. Unset runs the single-store flavour, where
    /// the ingress store also holds the rate-limit counters.
    #[envconfig(from = "REDIS_URI_RATE_LIMIT")]
    pub redis_uri_rate_limit: Option<StoreUris>,

    #[envconfig(default = "strict")]
    pub ingress_probe_policy: ProbePolicy,

    #[envconfig(default = "strict")]
    pub rate_limit_probe_policy: ProbePolicy,

    #[envconfig(default = "1000")]
    pub store_ping_interval_ms: EnvMsDuration,

    #[envconfig(default = "500")]
    pub store_retry_delay_ms: EnvMsDuration,

    #[envconfig(default = "10")]
    pub store_max_retries: u32,

    pub shutdown_close_timeout_ms: Option<EnvMsDuration>,

    pub error_report_url: Option<Redacted>,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "push")]
    pub otel_service_name: String,

    #[envconfig(default = "info")]
    pub otel_log_level: tracing::Level,
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{0}")]
    Env(envconfig::Error),
    #[error("invalid value for {variable}: {reason}")]
    Invalid {
        variable: &'static str,
        reason: &'static str,
    },
}

impl From<envconfig::Error> for ConfigurationError {
    fn from(err: envconfig::Error) -> Self {
        ConfigurationError::Env(err)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::init_from_env()?.validate()
    }

    pub fn from_hashmap(vars: &HashMap<String, String>) -> Result<Self, ConfigurationError> {
        Self::init_from_hashmap(vars)?.validate()
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&self.otel_sampling_rate) {
            return Err(ConfigurationError::Invalid {
                variable: "OTEL_SAMPLING_RATE",
                reason: "must be between 0 and 1",
            });
        }
        if self.store_ping_interval_ms.0.is_zero() {
            return Err(ConfigurationError::Invalid {
                variable: "STORE_PING_INTERVAL_MS",
                reason: "must be greater than 0",
            });
        }
        Ok(self)
    }

    pub fn redis_options(&self) -> RedisOptions {
        RedisOptions {
            ping_interval: self.store_ping_interval_ms.0,
            retry_delay: self.store_retry_delay_ms.0,
            max_retries: Some(self.store_max_retries),
        }
    }

    pub fn close_timeout(&self) -> Option<time::Duration> {
        self.shutdown_close_timeout_ms.map(|timeout| timeout.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// A secret configuration value. Formats as `[redacted]`, use
/// [`Redacted::expose`] to get the value itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted(String);

impl Redacted {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl FromStr for Redacted {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Redacted(s.to_owned()))
    }
}

/// One or more redis URIs, comma-separated. Several URIs are the nodes of a
/// cluster serving the same logical store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreUris(Vec<Redacted>);

impl StoreUris {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(Redacted::expose)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StoreUris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreUris([redacted; {}])", self.0.len())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseStoreUrisError {
    #[error("no store uri given")]
    Empty,
    // never carries the uri itself
    #[error("store uri #{position} is not a valid redis uri")]
    Invalid { position: usize },
}

impl FromStr for StoreUris {
    type Err = ParseStoreUrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseStoreUrisError::Empty);
        }

        let uris = s
            .split(',')
            .map(str::trim)
            .enumerate()
            .map(|(index, uri)| {
                if uri.is_empty() || uri.into_connection_info().is_err() {
                    Err(ParseStoreUrisError::Invalid {
                        position: index + 1,
                    })
                } else {
                    Ok(Redacted(uri.to_owned()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreUris(uris))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_URI: &str = "redis://:hunter2@ingress.internal:6379/0";

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_hashmap(&vars(&[("REDIS_URI_INGRESS", SECRET_URI)])).unwrap();

        assert_eq!(config.address, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.redis_uri_ingress.iter().collect::<Vec<_>>(), vec![SECRET_URI]);
        assert!(config.redis_uri_rate_limit.is_none());
        assert_eq!(config.ingress_probe_policy, ProbePolicy::StrictReady);
        assert_eq!(config.rate_limit_probe_policy, ProbePolicy::StrictReady);
        assert_eq!(config.close_timeout(), None);
        assert!(config.export_prometheus);

        let options = config.redis_options();
        assert_eq!(options.ping_interval, time::Duration::from_secs(1));
        assert_eq!(options.max_retries, Some(10));
    }

    #[test]
    fn ingress_uri_is_required() {
        let err = Config::from_hashmap(&vars(&[("REDIS_URI_RATE_LIMIT", SECRET_URI)]))
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("REDIS_URI_INGRESS"), "{message}");
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn invalid_uri_is_rejected_without_leaking_it() {
        let err = Config::from_hashmap(&vars(&[("REDIS_URI_INGRESS", "mysql://hunter2@db")]))
            .unwrap_err();

        assert!(!err.to_string().contains("hunter2"));
        assert!(!format!("{err:?}").contains("hunter2"));
    }

    #[test]
    fn debug_output_is_redacted() {
        let config = Config::from_hashmap(&vars(&[
            ("REDIS_URI_INGRESS", SECRET_URI),
            ("REDIS_URI_RATE_LIMIT", "redis://:s3cret@limits:6379"),
            ("ERROR_REPORT_URL", "https://key@errors.example.com/42"),
        ]))
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("key@errors"));
        assert!(debug.contains("[redacted"));
    }

    #[test]
    fn dual_store_with_policies_and_cluster() {
        let config = Config::from_hashmap(&vars(&[
            (
                "REDIS_URI_INGRESS",
                "redis://node-1:6379, redis://node-2:6379,redis://node-3:6379",
            ),
            ("REDIS_URI_RATE_LIMIT", "redis://limits:6379"),
            ("INGRESS_PROBE_POLICY", "tolerant"),
            ("SHUTDOWN_CLOSE_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.redis_uri_ingress.len(), 3);
        assert_eq!(
            config.redis_uri_ingress.iter().nth(1),
            Some("redis://node-2:6379")
        );
        assert_eq!(config.redis_uri_rate_limit.map(|uris| uris.len()), Some(1));
        assert_eq!(config.ingress_probe_policy, ProbePolicy::TolerantLiveness);
        assert_eq!(
            config.shutdown_close_timeout_ms.map(|t| t.0),
            Some(time::Duration::from_millis(2500))
        );
    }

    #[test]
    fn store_uris_parsing() {
        assert_eq!("".parse::<StoreUris>(), Err(ParseStoreUrisError::Empty));
        assert_eq!(
            "redis://a:6379,,redis://b:6379".parse::<StoreUris>(),
            Err(ParseStoreUrisError::Invalid { position: 2 })
        );
        assert_eq!(
            "redis://a:6379".parse::<StoreUris>().map(|uris| uris.len()),
            Ok(1)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = Config::from_hashmap(&vars(&[
            ("REDIS_URI_INGRESS", SECRET_URI),
            ("OTEL_SAMPLING_RATE", "1.5"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Invalid {
                variable: "OTEL_SAMPLING_RATE",
                ..
            }
        ));

        let err = Config::from_hashmap(&vars(&[
            ("REDIS_URI_INGRESS", SECRET_URI),
            ("STORE_PING_INTERVAL_MS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Invalid {
                variable: "STORE_PING_INTERVAL_MS",
                ..
            }
        ));
    }
}
