//! Environment configuration for the sweeper worker.

use thiserror::Error;

/// Configuration for the workflow worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum database connections for the worker pool.
    pub max_connections: u32,

    /// Escalation sweep interval in seconds.
    pub sweep_interval_secs: u64,

    /// SLA monitoring interval in seconds.
    pub sla_interval_secs: u64,

    /// Batch size for sweeper queries.
    pub batch_size: i64,
}

/// Errors from loading worker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Lets tests supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let database_url =
            reader("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL".into()))?;

        let max_connections = parse_or(&reader, "SITESAFE_WORKER_MAX_CONNECTIONS", 5)?;
        let sweep_interval_secs = parse_or(&reader, "SITESAFE_SWEEP_INTERVAL_SECS", 60)?;
        let sla_interval_secs = parse_or(&reader, "SITESAFE_SLA_INTERVAL_SECS", 60)?;
        let batch_size = parse_or(&reader, "SITESAFE_SWEEP_BATCH_SIZE", 100)?;

        Ok(Self {
            database_url,
            max_connections,
            sweep_interval_secs: sweep_interval_secs.max(1),
            sla_interval_secs: sla_interval_secs.max(1),
            batch_size: i64::from(batch_size).max(1),
        })
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(
        pairs: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn requires_database_url() {
        let err = WorkerConfig::from_reader(vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn defaults_apply() {
        let config =
            WorkerConfig::from_reader(vars(&[("DATABASE_URL", "postgres://x")])).unwrap();
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.sla_interval_secs, 60);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn overrides_and_validation() {
        let config = WorkerConfig::from_reader(vars(&[
            ("DATABASE_URL", "postgres://x"),
            ("SITESAFE_SWEEP_INTERVAL_SECS", "15"),
            ("SITESAFE_SWEEP_BATCH_SIZE", "25"),
        ]))
        .unwrap();
        assert_eq!(config.sweep_interval_secs, 15);
        assert_eq!(config.batch_size, 25);

        let err = WorkerConfig::from_reader(vars(&[
            ("DATABASE_URL", "postgres://x"),
            ("SITESAFE_SWEEP_INTERVAL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    }
}
