use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub route53: Route53Config,
    /// Pins the hosted zone and hostname; when absent both come from the request body.
    #[serde(default)]
    pub target: Option<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub source_ip: SourceIpMode,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Where the caller's observed address is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceIpMode {
    /// First hop of `X-Forwarded-For`, then `X-Real-IP`, as set by the fronting gateway.
    #[default]
    Forwarded,
    /// The TCP peer address of the connection.
    Peer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route53Config {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub hosted_zone: String,
    pub hostname: String,
}

/// How the zone and hostname of an update are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    RequestSupplied,
    Fixed {
        hosted_zone: String,
        hostname: String,
    },
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    4096
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            source_ip: SourceIpMode::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for Route53Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Route53Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.route53.timeout_secs == 0 {
            bail!("route53.timeout_secs must be greater than zero");
        }
        if self.server.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be greater than zero");
        }
        if let Some(target) = &self.target {
            if target.hosted_zone.trim().is_empty() {
                bail!("target.hosted_zone must not be empty");
            }
            if target.hostname.trim().is_empty() {
                bail!("target.hostname must not be empty");
            }
        }
        Ok(())
    }

    pub fn target_mode(&self) -> TargetMode {
        match &self.target {
            Some(target) => TargetMode::Fixed {
                hosted_zone: target.hosted_zone.clone(),
                hostname: target.hostname.clone(),
            },
            None => TargetMode::RequestSupplied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.source_ip, SourceIpMode::Forwarded);
        assert_eq!(config.server.max_body_bytes, 4096);
        assert_eq!(config.route53.timeout(), Duration::from_secs(10));
        assert!(config.route53.region.is_none());
        assert_eq!(config.target_mode(), TargetMode::RequestSupplied);
    }

    #[test]
    fn target_section_pins_zone_and_hostname() {
        let config = Config::parse(
            r#"
            [server]
            port = 8080
            source_ip = "peer"

            [route53]
            region = "us-east-1"
            timeout_secs = 5

            [target]
            hosted_zone = "Z1N0R6CQ9D3SXO"
            hostname = "home.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.source_ip, SourceIpMode::Peer);
        assert_eq!(config.route53.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.route53.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.target_mode(),
            TargetMode::Fixed {
                hosted_zone: "Z1N0R6CQ9D3SXO".to_string(),
                hostname: "home.example.com".to_string(),
            }
        );
    }

    #[test]
    fn rejects_blank_target_fields() {
        let err = Config::parse(
            r#"
            [target]
            hosted_zone = ""
            hostname = "home.example.com"
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("hosted_zone"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = Config::parse("[route53]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn rejects_unknown_source_ip_mode() {
        assert!(Config::parse("[server]\nsource_ip = \"header\"\n").is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/route53-ddns.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
