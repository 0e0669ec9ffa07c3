use serde::Deserialize;
use thiserror::Error;

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::routing::retry::{PolicyError, RetryPolicy};
use crate::routing::route_ops_bsd::DEFAULT_ROUTE_BINARY;

pub const DEFAULT_PATH: &str = "/etc/meshvpn/config.toml";
pub const ENV_VAR: &str = "MESHVPN_CONFIG_PATH";
pub const DEFAULT_VPN_INTERFACE: &str = "utun100";

const KNOWN_KEYS: [&str; 3] = ["vpn_interface", "route_binary", "retry"];
const KNOWN_RETRY_KEYS: [&str; 3] = ["initial_interval", "max_interval", "max_elapsed_time"];

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the tunnel interface routes are installed on.
    pub vpn_interface: String,
    /// Route utility, resolved through PATH unless absolute.
    pub route_binary: PathBuf,
    pub retry: RetryPolicy,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration file not found")]
    NoFile,
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    TomlDeserialization(#[from] toml::de::Error),
    #[error("Invalid retry policy: {0}")]
    RetryPolicy(#[from] PolicyError),
    #[error("VPN interface name must not be empty")]
    EmptyInterface,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vpn_interface: DEFAULT_VPN_INTERFACE.to_string(),
            route_binary: PathBuf::from(DEFAULT_ROUTE_BINARY),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.vpn_interface.trim().is_empty() {
            return Err(Error::EmptyInterface);
        }
        self.retry.validate()?;
        Ok(())
    }
}

pub async fn read(path: &Path) -> Result<Config, Error> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NoFile
        } else {
            Error::IO(e)
        }
    })?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Config, Error> {
    let table = content.parse::<toml::Table>()?;
    for key in wrong_keys(&table) {
        tracing::warn!(%key, "ignoring unsupported key in configuration file");
    }
    let config = toml::from_str::<Config>(content)?;
    config.validate()?;
    Ok(config)
}

fn wrong_keys(table: &toml::Table) -> Vec<String> {
    let mut wrong: Vec<String> = table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect();

    if let Some(retry) = table.get("retry").and_then(|v| v.as_table()) {
        wrong.extend(
            retry
                .keys()
                .filter(|key| !KNOWN_RETRY_KEYS.contains(&key.as_str()))
                .map(|key| format!("retry.{key}")),
        );
    }
    wrong
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn empty_file_yields_defaults() -> anyhow::Result<()> {
        let config = parse("")?;
        assert_eq!(config, Config::default());
        assert_eq!(config.retry.initial_interval, Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn parses_humantime_retry_policy() -> anyhow::Result<()> {
        let config = parse(
            r#"
            vpn_interface = "utun7"
            route_binary = "/sbin/route"

            [retry]
            initial_interval = "10ms"
            max_interval = "200ms"
            max_elapsed_time = "2s"
            "#,
        )?;

        assert_eq!(config.vpn_interface, "utun7");
        assert_eq!(config.route_binary, PathBuf::from("/sbin/route"));
        assert_eq!(
            config.retry,
            RetryPolicy {
                initial_interval: Duration::from_millis(10),
                max_interval: Duration::from_millis(200),
                max_elapsed_time: Duration::from_secs(2),
            }
        );
        Ok(())
    }

    #[test]
    fn partial_retry_table_keeps_remaining_defaults() -> anyhow::Result<()> {
        let config = parse(
            r#"
            [retry]
            max_elapsed_time = "5s"
            "#,
        )?;

        assert_eq!(config.retry.initial_interval, Duration::from_millis(50));
        assert_eq!(config.retry.max_elapsed_time, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn reports_unknown_keys() -> anyhow::Result<()> {
        let table = r#"
            vpn_interface = "utun7"
            dns = "1.1.1.1"

            [retry]
            jitter = 0.5
            "#
        .parse::<toml::Table>()?;

        assert_eq!(wrong_keys(&table), vec!["dns".to_string(), "retry.jitter".to_string()]);
        Ok(())
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(parse(r#"vpn_interface = " ""#), Err(Error::EmptyInterface)));
        assert!(matches!(
            parse("[retry]\ninitial_interval = \"2s\"\nmax_interval = \"1s\""),
            Err(Error::RetryPolicy(_))
        ));
        assert!(matches!(
            parse("[retry]\ninitial_interval = \"soon\""),
            Err(Error::TomlDeserialization(_))
        ));
    }

    #[tokio::test]
    async fn reads_config_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "vpn_interface = \"utun3\"\n").await?;

        let config = read(&path).await?;
        assert_eq!(config.vpn_interface, "utun3");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_reported() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let res = read(&dir.path().join("absent.toml")).await;
        assert!(matches!(res, Err(Error::NoFile)));
        Ok(())
    }
}
