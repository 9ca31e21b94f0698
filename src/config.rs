use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::workflows::fixes::rule::RuleSpec;
use crate::workflows::registry::{FixesFile, Registry};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Also append log lines to this file.
    pub file: Option<PathBuf>,
    pub level: Option<String>,
}

/// Everything the hook needs, passed explicitly from `main`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    /// Command template run by `hook`.
    pub command: Option<String>,
    /// Extra `[[fix]]` tables, relative to the config file.
    pub fixes_file: Option<PathBuf>,
    #[serde(default, rename = "fix")]
    pub fixes: Vec<RuleSpec>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Loads the config from `path`, or from the default location when no
    /// path is given. A missing default file yields the default config.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = get_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {path:?}"))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn fixes_path(&self) -> Option<PathBuf> {
        let fixes_file = self.fixes_file.as_ref()?;
        Some(match &self.base_dir {
            Some(base_dir) if fixes_file.is_relative() => base_dir.join(fixes_file),
            _ => fixes_file.clone(),
        })
    }

    /// Builds the registry from the inline fixes followed by the fixes file.
    pub fn registry(&self) -> Result<Registry> {
        let mut specs = self.fixes.clone();
        if let Some(path) = self.fixes_path() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read fixes file {path:?}"))?;
            let file: FixesFile = toml::from_str(&content)
                .with_context(|| format!("Invalid fixes file {path:?}"))?;
            specs.extend(file.fixes);
        }
        Registry::build(specs).context("Invalid fix registry")
    }
}

fn get_config_dir_path() -> PathBuf {
    xdir::config()
        .map(|path| path.join("podcast-tagfix"))
        // If the standard path could not be found (e.g.`$HOME` is not set),
        // default to the current directory.
        .unwrap_or_default()
}

pub fn get_config_path() -> PathBuf {
    get_config_dir_path().join("config.toml")
}
