// Dashboard configuration
// Layering: defaults → optional JSON file (DASHBOARD_CONFIG) → environment overrides

use crate::aggregation::MissingYearPolicy;
use crate::error::{PipelineError, Result};
use crate::sparkline::DEFAULT_MAX_LEN;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SELECTED_YEAR: i32 = 2021;
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory holding the four CSV files
    pub data_dir: PathBuf,

    pub fact_file: String,
    pub date_file: String,
    pub region_file: String,
    pub customer_file: String,

    /// Keep only this many fact rows (seeded random sample); `None` keeps all
    pub sample_size: Option<usize>,
    pub sample_seed: u64,

    /// Year shown in the monthly chart
    pub selected_year: i32,
    pub missing_year_policy: MissingYearPolicy,

    pub sparkline_max_len: usize,

    /// HTTP bind address for the server binary
    pub bind: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_dir: PathBuf::from("."),
            fact_file: "Transactions_Fact.csv".to_string(),
            date_file: "Date_Dimension.csv".to_string(),
            region_file: "Region_Dimension.csv".to_string(),
            customer_file: "Customer_Dimension.csv".to_string(),
            sample_size: None,
            sample_seed: DEFAULT_SAMPLE_SEED,
            selected_year: DEFAULT_SELECTED_YEAR,
            missing_year_policy: MissingYearPolicy::Empty,
            sparkline_max_len: DEFAULT_MAX_LEN,
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from `DASHBOARD_CONFIG` (if set) and environment variables
    ///
    /// Recognised variables: DASHBOARD_DATA_DIR, DASHBOARD_SAMPLE_SIZE,
    /// DASHBOARD_SAMPLE_SEED, DASHBOARD_SELECTED_YEAR, DASHBOARD_SPARKLINE_LEN,
    /// DASHBOARD_MISSING_YEAR (empty|error), DASHBOARD_BIND.
    pub fn from_env() -> Result<Self> {
        let base = match env::var("DASHBOARD_CONFIG") {
            Ok(path) => Self::from_json_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PipelineError::Config(format!("config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable source (the environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DASHBOARD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(size) = lookup("DASHBOARD_SAMPLE_SIZE") {
            self.sample_size = Some(parse_var("DASHBOARD_SAMPLE_SIZE", &size)?);
        }
        if let Some(seed) = lookup("DASHBOARD_SAMPLE_SEED") {
            self.sample_seed = parse_var("DASHBOARD_SAMPLE_SEED", &seed)?;
        }
        if let Some(year) = lookup("DASHBOARD_SELECTED_YEAR") {
            self.selected_year = parse_var("DASHBOARD_SELECTED_YEAR", &year)?;
        }
        if let Some(len) = lookup("DASHBOARD_SPARKLINE_LEN") {
            self.sparkline_max_len = parse_var("DASHBOARD_SPARKLINE_LEN", &len)?;
        }
        if let Some(policy) = lookup("DASHBOARD_MISSING_YEAR") {
            self.missing_year_policy = match policy.trim().to_lowercase().as_str() {
                "empty" => MissingYearPolicy::Empty,
                "error" => MissingYearPolicy::Error,
                other => {
                    return Err(PipelineError::Config(format!(
                        "DASHBOARD_MISSING_YEAR must be `empty` or `error`, got `{other}`"
                    )))
                }
            };
        }
        if let Some(bind) = lookup("DASHBOARD_BIND") {
            self.bind = bind;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sparkline_max_len == 0 {
            return Err(PipelineError::Config(
                "sparkline_max_len must be positive".to_string(),
            ));
        }
        if self.sample_size == Some(0) {
            return Err(PipelineError::Config(
                "sample_size must be positive when set".to_string(),
            ));
        }
        if self.selected_year < 1 {
            return Err(PipelineError::Config(format!(
                "selected_year {} is not a valid year",
                self.selected_year
            )));
        }
        Ok(())
    }

    pub fn fact_path(&self) -> PathBuf {
        self.data_dir.join(&self.fact_file)
    }

    pub fn date_path(&self) -> PathBuf {
        self.data_dir.join(&self.date_file)
    }

    pub fn region_path(&self) -> PathBuf {
        self.data_dir.join(&self.region_file)
    }

    pub fn customer_path(&self) -> PathBuf {
        self.data_dir.join(&self.customer_file)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{name} has invalid value `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.selected_year, 2021);
        assert_eq!(config.sparkline_max_len, 20);
        assert_eq!(config.sample_seed, 42);
        assert_eq!(config.sample_size, None);
        assert_eq!(config.missing_year_policy, MissingYearPolicy::Empty);
        assert_eq!(config.fact_path(), PathBuf::from("./Transactions_Fact.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = DashboardConfig::default()
            .with_overrides(vars(&[
                ("DASHBOARD_DATA_DIR", "/data"),
                ("DASHBOARD_SAMPLE_SIZE", "100000"),
                ("DASHBOARD_SELECTED_YEAR", "2023"),
                ("DASHBOARD_SPARKLINE_LEN", "12"),
                ("DASHBOARD_MISSING_YEAR", "Error"),
            ]))
            .unwrap();

        assert_eq!(config.region_path(), PathBuf::from("/data/Region_Dimension.csv"));
        assert_eq!(config.sample_size, Some(100_000));
        assert_eq!(config.selected_year, 2023);
        assert_eq!(config.sparkline_max_len, 12);
        assert_eq!(config.missing_year_policy, MissingYearPolicy::Error);
    }

    #[test]
    fn test_invalid_overrides_are_config_errors() {
        let err = DashboardConfig::default()
            .with_overrides(vars(&[("DASHBOARD_SELECTED_YEAR", "twenty")]))
            .unwrap_err();
        assert!(err.is_configuration());

        let err = DashboardConfig::default()
            .with_overrides(vars(&[("DASHBOARD_SPARKLINE_LEN", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("sparkline_max_len"));

        let err = DashboardConfig::default()
            .with_overrides(vars(&[("DASHBOARD_MISSING_YEAR", "zero")]))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_json_partial_config_keeps_defaults() {
        let config = DashboardConfig::from_json(
            r#"{ "data_dir": "/srv/dw", "selected_year": 2022, "missing_year_policy": "error" }"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/dw"));
        assert_eq!(config.selected_year, 2022);
        assert_eq!(config.missing_year_policy, MissingYearPolicy::Error);
        assert_eq!(config.customer_file, "Customer_Dimension.csv");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = DashboardConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
