use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::CreateTemplate;
use crate::driver::DispatchConfig;
use crate::error::{BatchrError, Result};
use crate::errorlog::ErrorLogConfig;
use crate::gate::GateConfig;
use crate::report::ReportConfig;
use crate::service::Credentials;
use crate::source::ListingConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub gate: GateConfig,
    pub dispatch: DispatchConfig,
    pub listing: ListingConfig,
    pub report: ReportConfig,
    pub errors: ErrorLogConfig,
    pub service: ServiceConfig,
    pub create: CreateTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Environment variable holding the account id
    pub account_env: String,
    /// Environment variable holding the auth token
    pub token_env: String,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1/".to_string(),
            account_env: "BATCHR_ACCOUNT_SID".to_string(),
            token_env: "BATCHR_AUTH_TOKEN".to_string(),
            timeout_ms: 30000,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::from_env(&self.account_env, &self.token_env)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            gate: GateConfig::default(),
            dispatch: DispatchConfig::default(),
            listing: ListingConfig::default(),
            report: ReportConfig::default(),
            errors: ErrorLogConfig::default(),
            service: ServiceConfig::default(),
            create: CreateTemplate::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .map_err(|e| BatchrError::Config(format!("Failed to load config from {}: {}", path.display(), e)));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings the dispatch engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(BatchrError::Config(msg.to_string()));

        if self.gate.concurrency == 0 {
            return invalid("gate.concurrency must be at least 1");
        }
        if self.gate.rate > 0 && self.gate.interval_ms == 0 {
            return invalid("gate.interval_ms must be positive when gate.rate is set");
        }
        let rate = self.dispatch.retry_sample_rate;
        if !(0.0..=1.0).contains(&rate) {
            return invalid("dispatch.retry_sample_rate must be between 0 and 1");
        }
        if self.listing.page_size == 0 {
            return invalid("listing.page_size must be at least 1");
        }
        if self.listing.round_interval_secs == Some(0) {
            return invalid("listing.round_interval_secs must be positive");
        }
        if self.service.base_url.trim().is_empty() {
            return invalid("service.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate.concurrency, 70);
        assert_eq!(config.gate.rate, 100);
        assert_eq!(config.dispatch.total, 250_000);
        assert_eq!(config.report.interval_ms, 500);
        assert_eq!(config.listing.round_interval_secs, Some(300));
    }

    #[test]
    fn test_load_explicit_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batchr.yml");
        fs::write(
            &path,
            "gate:\n  concurrency: 4\ndispatch:\n  total: 10\ncreate:\n  to: \"+15550001111\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.gate.concurrency, 4);
        assert_eq!(config.gate.rate, 100);
        assert_eq!(config.dispatch.total, 10);
        assert_eq!(config.create.to, "+15550001111");
        assert_eq!(config.create.lead_time_secs, 172_800);
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("nope.yml"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.gate.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.retry_sample_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.retry_sample_rate = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.listing.round_interval_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batchr.yml");
        fs::write(&path, "gate:\n  concurrency: 0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_yaml_roundtrip_sections() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        for section in ["gate:", "dispatch:", "listing:", "report:", "errors:", "service:", "create:"] {
            assert!(yaml.contains(section), "missing {}", section);
        }
    }
}
