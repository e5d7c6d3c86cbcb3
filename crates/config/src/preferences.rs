//! 本地偏好存储，目前只保存主题

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme: {s}. Valid themes: light, dark")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在时返回默认值
    pub fn load(&self) -> ConfigResult<Preferences> {
        if !self.path.exists() {
            debug!("Preference file {} not found, using defaults", self.path.display());
            return Ok(Preferences::default());
        }
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::Configuration(format!(
                "无法解析偏好文件 {}: {e}",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, preferences: &Preferences) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(preferences)?;
        fs::write(&self.path, content)?;
        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }

    pub fn theme(&self) -> ConfigResult<Theme> {
        Ok(self.load()?.theme)
    }

    pub fn set_theme(&self, theme: Theme) -> ConfigResult<Preferences> {
        let mut preferences = self.load()?;
        preferences.theme = theme;
        self.save(&preferences)?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_defaults_to_light() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("prefs.toml"));
        assert_eq!(store.theme().unwrap(), Theme::Light);
    }

    #[test]
    fn test_set_theme_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");
        let store = PreferenceStore::new(&path);
        store.set_theme(Theme::Dark).unwrap();

        let reopened = PreferenceStore::new(&path);
        assert_eq!(reopened.theme().unwrap(), Theme::Dark);
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        fs::write(&path, "theme = \"purple\"").unwrap();
        let err = PreferenceStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Configuration(_)));
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
    }
}
