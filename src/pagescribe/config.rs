use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_THUMBNAIL_SIZE: u32 = 200;

pub const ENV_QPDF: &str = "PAGESCRIBE_QPDF";
pub const ENV_PDFTOCAIRO: &str = "PAGESCRIBE_PDFTOCAIRO";
pub const ENV_INKSCAPE: &str = "PAGESCRIBE_INKSCAPE";
pub const ENV_THUMBNAIL_SIZE: &str = "PAGESCRIBE_THUMBNAIL_SIZE";

/// Programs used for the external tool protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolPaths {
    #[serde(default = "default_qpdf")]
    pub qpdf: String,

    #[serde(default = "default_pdftocairo")]
    pub pdftocairo: String,

    #[serde(default = "default_inkscape")]
    pub inkscape: String,
}

fn default_qpdf() -> String {
    "qpdf".to_string()
}

fn default_pdftocairo() -> String {
    "pdftocairo".to_string()
}

fn default_inkscape() -> String {
    "inkscape".to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            qpdf: default_qpdf(),
            pdftocairo: default_pdftocairo(),
            inkscape: default_inkscape(),
        }
    }
}

/// Configuration for pagescribe, stored as config.json in the config dir
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScribeConfig {
    #[serde(default)]
    pub tools: ToolPaths,

    /// Longest side of generated thumbnails, in pixels
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Parent directory for session staging directories (system temp if unset)
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
}

fn default_thumbnail_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            staging_root: None,
        }
    }
}

impl ScribeConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(ScribeError::Io)?;
        let config: ScribeConfig =
            serde_json::from_str(&content).map_err(ScribeError::Serialization)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(ScribeError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(ScribeError::Serialization)?;
        fs::write(config_path, content).map_err(ScribeError::Io)?;
        Ok(())
    }

    /// Apply `PAGESCRIBE_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(qpdf) = non_empty(ENV_QPDF) {
            self.tools.qpdf = qpdf;
        }
        if let Some(pdftocairo) = non_empty(ENV_PDFTOCAIRO) {
            self.tools.pdftocairo = pdftocairo;
        }
        if let Some(inkscape) = non_empty(ENV_INKSCAPE) {
            self.tools.inkscape = inkscape;
        }
        if let Some(size) = non_empty(ENV_THUMBNAIL_SIZE) {
            self.thumbnail_size = size.trim().parse().map_err(|_| {
                ScribeError::Config(format!("{} must be a positive integer", ENV_THUMBNAIL_SIZE))
            })?;
        }
        self.validate()
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn validate(&self) -> Result<()> {
        if self.thumbnail_size == 0 {
            return Err(ScribeError::Config(
                "thumbnail_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ScribeConfig::default();
        assert_eq!(config.thumbnail_size, 200);
        assert_eq!(config.tools.qpdf, "qpdf");
        assert_eq!(config.tools.inkscape, "inkscape");
        assert!(config.staging_root.is_none());
    }

    #[test]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = ScribeConfig::load(temp.path()).unwrap();
        assert_eq!(config, ScribeConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested");

        let mut config = ScribeConfig::default();
        config.thumbnail_size = 320;
        config.tools.inkscape = "/opt/inkscape/bin/inkscape".to_string();
        config.save(&dir).unwrap();

        let loaded = ScribeConfig::load(&dir).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILENAME),
            r#"{"tools": {"qpdf": "/usr/local/bin/qpdf"}}"#,
        )
        .unwrap();

        let config = ScribeConfig::load(temp.path()).unwrap();
        assert_eq!(config.tools.qpdf, "/usr/local/bin/qpdf");
        assert_eq!(config.tools.pdftocairo, "pdftocairo");
        assert_eq!(config.thumbnail_size, 200);
    }

    #[test]
    fn test_zero_thumbnail_size_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILENAME),
            r#"{"thumbnail_size": 0}"#,
        )
        .unwrap();
        assert!(matches!(
            ScribeConfig::load(temp.path()),
            Err(ScribeError::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_INKSCAPE, "/tmp/fake-inkscape"),
            (ENV_THUMBNAIL_SIZE, "64"),
            (ENV_QPDF, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ScribeConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.tools.inkscape, "/tmp/fake-inkscape");
        assert_eq!(config.thumbnail_size, 64);
        // empty values are ignored
        assert_eq!(config.tools.qpdf, "qpdf");
    }

    #[test]
    fn test_bad_thumbnail_override() {
        let mut config = ScribeConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_THUMBNAIL_SIZE).then(|| "big".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_THUMBNAIL_SIZE));
    }
}
