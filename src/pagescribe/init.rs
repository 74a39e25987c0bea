use crate::api::ScribeApi;
use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::session::SessionOptions;
use crate::tools::ProcessToolkit;
use directories::ProjectDirs;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

pub const ENV_HOME: &str = "PAGESCRIBE_HOME";

/// Directory holding `config.json`.
///
/// `PAGESCRIBE_HOME` wins when set (tests use it to isolate state), otherwise
/// the platform config directory.
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(std::env::var(ENV_HOME).ok())
}

fn resolve_config_dir(home_override: Option<String>) -> Result<PathBuf> {
    if let Some(home) = home_override.filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("com", "pagescribe", "pagescribe")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| ScribeError::Config("could not determine config directory".to_string()))
}

/// Loads configuration, applies environment overrides and builds the API
/// over the real external programs.
pub fn initialize() -> Result<ScribeApi<ProcessToolkit>> {
    let config_dir = config_dir()?;
    let mut config = ScribeConfig::load(&config_dir)?;
    config.apply_env()?;
    debug!("config from {}: {:?}", config_dir.display(), config);

    Ok(build_api(&config))
}

fn build_api(config: &ScribeConfig) -> ScribeApi<ProcessToolkit> {
    let toolkit = Arc::new(ProcessToolkit::new(config.tools.clone()));
    ScribeApi::new(toolkit, SessionOptions::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn home_override_is_used_directly() {
        let dir = resolve_config_dir(Some("/tmp/scribe-home".to_string())).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/scribe-home"));
    }

    #[test]
    fn empty_override_falls_back_to_platform_dir() {
        if let Ok(dir) = resolve_config_dir(Some(String::new())) {
            assert!(dir.to_string_lossy().contains("pagescribe"));
        }
    }

    #[test]
    fn context_uses_configured_tools_and_staging() {
        let temp = TempDir::new().unwrap();
        let mut config = ScribeConfig::default();
        config.tools.inkscape = "/opt/inkscape/bin/inkscape".to_string();
        config.thumbnail_size = 320;
        config.staging_root = Some(temp.path().join("stage"));
        config.save(temp.path()).unwrap();

        let loaded = ScribeConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.tools.inkscape, "/opt/inkscape/bin/inkscape");
        let api = build_api(&loaded);

        assert_eq!(api.options().thumbnail_size, 320);
        assert_eq!(api.options().staging_root, Some(temp.path().join("stage")));
        assert!(!api.is_open());
    }
}
