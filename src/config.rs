//! Configuration management for the report generator

use crate::reports::formatters::NullDisplay;
use crate::reports::risk::DEFAULT_TITLE;
use crate::reports::{FeatureOverrides, ReportVersion, RiskReportOptions};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_OUTPUT_DIR: &str = "reports";
const DEFAULT_MAIN_MESSAGE_LIMIT: usize = 1800;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub query: QuerySettings,
    pub reports: ReportSettings,
    pub queries: QueryFiles,
    pub slack: SlackSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    pub version: ReportVersion,
    #[serde(skip_serializing_if = "FeatureOverrides::is_empty")]
    pub features: FeatureOverrides,
    pub missing_currency: NullDisplay,
    pub products: Vec<String>,
    pub regions: Vec<String>,
    pub title: String,
    pub file_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFiles {
    pub risk: PathBuf,
    pub daily_report: PathBuf,
    pub daily_detail: PathBuf,
    pub funnel: PathBuf,
    pub horizons: Vec<HorizonQuery>,
}

/// One product of the multi-horizon report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonQuery {
    pub product: String,
    pub query: PathBuf,
    #[serde(default)]
    pub validate_targets: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    pub main_message_limit: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            command: "bq".to_string(),
            args: vec![
                "query".to_string(),
                "--use_legacy_sql=false".to_string(),
                "--format=json".to_string(),
            ],
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            payload_column: None,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            version: ReportVersion::default(),
            features: FeatureOverrides::default(),
            missing_currency: NullDisplay::default(),
            products: vec!["POR".to_string(), "R360".to_string()],
            regions: vec!["AMER".to_string(), "EMEA".to_string(), "APAC".to_string()],
            title: DEFAULT_TITLE.to_string(),
            file_prefix: "Risk_Report".to_string(),
        }
    }
}

impl Default for QueryFiles {
    fn default() -> Self {
        Self {
            risk: PathBuf::from("queries/risk_report.sql"),
            daily_report: PathBuf::from("queries/daily_report.sql"),
            daily_detail: PathBuf::from("queries/daily_detail.sql"),
            funnel: PathBuf::from("queries/tof_report.sql"),
            horizons: vec![
                HorizonQuery {
                    product: "POR".to_string(),
                    query: PathBuf::from("queries/por_risk_horizons.sql"),
                    validate_targets: false,
                },
                HorizonQuery {
                    product: "R360".to_string(),
                    query: PathBuf::from("queries/r360_risk_horizons.sql"),
                    validate_targets: true,
                },
            ],
        }
    }
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            main_message_limit: DEFAULT_MAIN_MESSAGE_LIMIT,
        }
    }
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load configuration from file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables if present
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(command) = std::env::var("REVOPS_QUERY_COMMAND") {
            self.query.command = command;
        }

        if let Ok(timeout) = std::env::var("REVOPS_QUERY_TIMEOUT_SECONDS") {
            self.query.timeout_seconds = timeout
                .parse()
                .with_context(|| format!("Invalid REVOPS_QUERY_TIMEOUT_SECONDS: {}", timeout))?;
        }

        if let Ok(output_dir) = std::env::var("REVOPS_OUTPUT_DIR") {
            self.reports.output_dir = PathBuf::from(output_dir);
        }

        if let Ok(version) = std::env::var("REVOPS_REPORT_VERSION") {
            self.reports.version = version.parse()?;
        }

        Ok(())
    }

    /// Merge with another configuration (other takes precedence where it differs from the defaults)
    pub fn merge_with(&mut self, other: Config) {
        let defaults = Config::default();

        // Merge query settings
        if other.query.command != defaults.query.command {
            self.query.command = other.query.command;
        }
        if other.query.args != defaults.query.args {
            self.query.args = other.query.args;
        }
        if other.query.timeout_seconds != defaults.query.timeout_seconds {
            self.query.timeout_seconds = other.query.timeout_seconds;
        }
        if other.query.payload_column.is_some() {
            self.query.payload_column = other.query.payload_column;
        }

        // Merge report settings
        let reports = other.reports;
        if reports.output_dir != defaults.reports.output_dir {
            self.reports.output_dir = reports.output_dir;
        }
        if reports.version != defaults.reports.version {
            self.reports.version = reports.version;
        }
        if !reports.features.is_empty() {
            self.reports.features = reports.features;
        }
        if reports.missing_currency != defaults.reports.missing_currency {
            self.reports.missing_currency = reports.missing_currency;
        }
        if reports.products != defaults.reports.products {
            self.reports.products = reports.products;
        }
        if reports.regions != defaults.reports.regions {
            self.reports.regions = reports.regions;
        }
        if reports.title != defaults.reports.title {
            self.reports.title = reports.title;
        }
        if reports.file_prefix != defaults.reports.file_prefix {
            self.reports.file_prefix = reports.file_prefix;
        }

        // Merge query files
        if other.queries.risk != defaults.queries.risk {
            self.queries.risk = other.queries.risk;
        }
        if other.queries.daily_report != defaults.queries.daily_report {
            self.queries.daily_report = other.queries.daily_report;
        }
        if other.queries.daily_detail != defaults.queries.daily_detail {
            self.queries.daily_detail = other.queries.daily_detail;
        }
        if other.queries.funnel != defaults.queries.funnel {
            self.queries.funnel = other.queries.funnel;
        }
        if other.queries.horizons != defaults.queries.horizons {
            self.queries.horizons = other.queries.horizons;
        }

        if other.slack.main_message_limit != defaults.slack.main_message_limit {
            self.slack.main_message_limit = other.slack.main_message_limit;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.query.command.trim().is_empty() {
            return Err(anyhow::anyhow!("Query command must not be empty"));
        }

        if self.query.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Query timeout must be greater than 0"));
        }

        if self.reports.products.is_empty() {
            return Err(anyhow::anyhow!("At least one product must be configured"));
        }

        if self.reports.regions.is_empty() {
            return Err(anyhow::anyhow!("At least one region must be configured"));
        }

        if self.reports.file_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("Report file prefix must not be empty"));
        }

        if self.slack.main_message_limit == 0 {
            return Err(anyhow::anyhow!("Slack main message limit must be greater than 0"));
        }

        Ok(())
    }

    /// Risk report options for the given version, or the configured one
    pub fn risk_options(&self, version: Option<ReportVersion>, generated_at: NaiveDateTime) -> RiskReportOptions {
        let version = version.unwrap_or(self.reports.version);
        RiskReportOptions {
            version,
            features: version.features().with_overrides(&self.reports.features),
            products: self.reports.products.clone(),
            regions: self.reports.regions.clone(),
            title: self.reports.title.clone(),
            missing_currency: self.reports.missing_currency,
            generated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_config_save_and_load() {
        let mut config = Config::default();
        config.query.payload_column = Some("report_json".to_string());
        config.reports.features.action_items = Some(false);
        let temp_file = NamedTempFile::new().unwrap();

        // Save config
        config.save_to_file(temp_file.path()).await.unwrap();

        // Load config
        let loaded_config = Config::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config, loaded_config);
        assert_eq!(loaded_config.query.timeout_seconds, 300);
        assert_eq!(loaded_config.reports.version, ReportVersion::V2_7);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "query:\n  command: sh\n  timeout_seconds: 5\nreports:\n  version: '2.5'\n  missing_currency: not_available\n",
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.query.command, "sh");
        assert_eq!(config.query.timeout_seconds, 5);
        assert_eq!(config.query.args, QuerySettings::default().args);
        assert_eq!(config.reports.version, ReportVersion::V2_5);
        assert_eq!(config.reports.missing_currency, NullDisplay::NotAvailable);
        assert_eq!(config.reports.regions, vec!["AMER", "EMEA", "APAC"]);
        assert_eq!(config.slack.main_message_limit, 1800);
    }

    #[tokio::test]
    async fn test_load_missing_file_names_path() {
        let err = Config::load_from_file("/nonexistent/revops.yaml").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/revops.yaml"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid timeout
        config.query.timeout_seconds = 0;
        assert!(config.validate().is_err());

        // Reset and test empty regions
        config = Config::default();
        config.reports.regions.clear();
        assert!(config.validate().is_err());

        config = Config::default();
        config.slack.main_message_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base_config = Config::default();
        let mut override_config = Config::default();

        override_config.query.timeout_seconds = 600;
        override_config.reports.version = ReportVersion::V2_6;
        override_config.reports.products = vec!["POR".to_string()];

        base_config.merge_with(override_config);

        assert_eq!(base_config.query.timeout_seconds, 600);
        assert_eq!(base_config.query.command, "bq");
        assert_eq!(base_config.reports.version, ReportVersion::V2_6);
        assert_eq!(base_config.reports.products, vec!["POR"]);
        assert_eq!(base_config.reports.regions.len(), 3);
    }

    #[test]
    fn test_risk_options_apply_feature_overrides() {
        let mut config = Config::default();
        config.reports.features.action_items = Some(true);

        let options = config.risk_options(Some(ReportVersion::V2_6), NaiveDateTime::default());
        assert_eq!(options.version, ReportVersion::V2_6);
        assert!(options.features.action_items);
        assert!(!options.features.top_risk_pockets);

        let options = config.risk_options(None, NaiveDateTime::default());
        assert_eq!(options.version, ReportVersion::V2_7);
    }
}
