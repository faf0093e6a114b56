// src/config.rs
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::collector::CollectorConfig;
use crate::regions::{Regions, ALL_REGIONS, DEFAULT_URL_TEMPLATE};

pub const ENV_CONFIG_PATH: &str = "POLICE_FEED_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/police_feed.toml";

/// Runtime settings shared by the `subscribe` and `server` commands.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Region ids, or `["all"]`.
    pub regions: Vec<String>,
    pub url_template: String,
    pub send_timeout_ms: u64,
    pub refresh_interval_secs: u64,
    pub update_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub db_path: PathBuf,
    pub addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            regions: vec![ALL_REGIONS.to_string()],
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            send_timeout_ms: 1000,
            refresh_interval_secs: 60,
            update_interval_secs: 10,
            http_timeout_secs: 10,
            db_path: PathBuf::from("police_feed.db"),
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Settings {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load using the explicit path, then env var + fallbacks:
    /// 1) `explicit`
    /// 2) $POLICE_FEED_CONFIG (must exist)
    /// 3) config/police_feed.toml
    /// 4) built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!(
                "{ENV_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            ));
        }
        let default_p = Path::new(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(default_p);
        }
        Ok(Self::default())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no engine could run with. Call again after applying
    /// command-line overrides.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("send_timeout_ms", self.send_timeout_ms),
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("update_interval_secs", self.update_interval_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        if self.url_template.trim().is_empty() {
            bail!("url_template must not be empty");
        }
        if !self.url_template.contains("{region}") {
            bail!("url_template must contain {{region}}");
        }
        self.addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid addr {:?}", self.addr))?;
        self.registry().resolve(&self.regions)?;
        Ok(())
    }

    pub fn registry(&self) -> Regions {
        Regions::new(self.url_template.clone())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            regions: self.regions.clone(),
            url_template: self.url_template.clone(),
            send_timeout: self.send_timeout(),
            refresh_interval: self.refresh_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let s = Settings::from_toml_str(
            r#"
            regions = ["skane", "halland"]
            send_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(s.regions, vec!["skane", "halland"]);
        assert_eq!(s.send_timeout(), Duration::from_millis(250));
        assert_eq!(s.refresh_interval_secs, 60);
    }

    #[test]
    fn rejects_bad_values() {
        for doc in [
            "refresh_interval_secs = 0",
            "send_timeout_ms = 0",
            "url_template = \"\"",
            "url_template = \"https://example.test/feed\"",
            "regions = [\"atlantis\"]",
            "addr = \"not an addr\"",
            "surprise = true",
        ] {
            assert!(Settings::from_toml_str(doc).is_err(), "accepted: {doc}");
        }
    }
}
