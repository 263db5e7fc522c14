//! CLI configuration file

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use restcheck_common::RunnerConfig;

/// Contents of `restcheck.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Replaces the base URL of every suite
    pub base_url: Option<String>,

    /// Default request timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Where `test-results.json` is written
    pub output_dir: Option<PathBuf>,

    /// Include the final value store in each suite report
    pub export_store: bool,
}

impl CliConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Runner settings with built-in defaults for anything unset
    pub fn runner_config(&self) -> RunnerConfig {
        let defaults = RunnerConfig::default();
        RunnerConfig {
            default_timeout: self
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            base_url: self.base_url.clone(),
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            export_store: self.export_store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = CliConfig::load(Path::new("/nonexistent/restcheck.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(
            config.runner_config().default_timeout,
            Duration::from_millis(restcheck_common::DEFAULT_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_load_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restcheck.toml");
        std::fs::write(
            &path,
            r#"
base_url = "http://localhost:3001"
timeout_ms = 5000
export_store = true

[headers]
Accept = "application/json"
"#,
        )
        .unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:3001"));
        let runner = config.runner_config();
        assert_eq!(runner.default_timeout, Duration::from_millis(5000));
        assert_eq!(runner.headers, vec![("Accept".to_string(), "application/json".to_string())]);
        assert!(runner.export_store);
    }
}
