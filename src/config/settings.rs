use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::analysis::AnalysisError;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_n: usize,
    pub histogram_bins: usize,
    pub resample_interval_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub scatter_file: PathBuf,
    pub open_browser: bool,
    pub interactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_json: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("capture.pcap"),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            histogram_bins: 50,
            resample_interval_secs: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scatter_file: PathBuf::from("3d_scatter_plot.html"),
            open_browser: true,
            interactive: true,
            export_json: None,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.analysis.histogram_bins == 0 {
            return Err(AnalysisError::InvalidBinCount);
        }
        if self.analysis.resample_interval_secs <= 0 {
            return Err(AnalysisError::InvalidInterval(self.analysis.resample_interval_secs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.capture.file, PathBuf::from("capture.pcap"));
        assert_eq!(config.analysis.top_n, 10);
        assert_eq!(config.analysis.histogram_bins, 50);
        assert_eq!(config.analysis.resample_interval_secs, 60);
        assert_eq!(config.output.scatter_file, PathBuf::from("3d_scatter_plot.html"));
        assert!(config.output.open_browser);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            top_n = 5

            [output]
            open_browser = false
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.analysis.histogram_bins, 50);
        assert!(!config.output.open_browser);
        assert!(config.output.interactive);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.analysis.histogram_bins = 0;
        assert_eq!(config.validate(), Err(AnalysisError::InvalidBinCount));

        let mut config = Config::default();
        config.analysis.resample_interval_secs = 0;
        assert_eq!(config.validate(), Err(AnalysisError::InvalidInterval(0)));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("capture-report-{}-config.toml", std::process::id()));
        let path = path.to_str().unwrap().to_string();

        let mut config = Config::default();
        config.capture.file = PathBuf::from("traces/office.pcap");
        config.analysis.top_n = 3;
        config.output.export_json = Some(PathBuf::from("report.json"));
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_file(path);
    }
}
