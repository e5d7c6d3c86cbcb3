use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api::{ApiConfig, DEFAULT_API_URL},
    logging::LogConfig,
    polling::{NotificationConfig, PollingConfig, PreferencesConfig},
};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub notifications: NotificationConfig,
    pub logging: LogConfig,
    pub preferences: PreferencesConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("api.base_url", DEFAULT_API_URL)?
            .set_default("api.request_timeout_seconds", 30)?
            .set_default("polling.interval_ms", 5000)?
            .set_default("polling.page_size", 20)?
            .set_default("polling.output_size_limit", 1024)?
            .set_default("notifications.dismiss_after_ms", 2000)?
            .set_default("notifications.capacity", 16)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("preferences.path", "console-preferences.toml")?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/console.toml", "console.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CONSOLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.api.validate()?;
        self.polling.validate()?;
        self.notifications.validate()?;
        self.logging.validate()?;
        self.preferences.validate()?;
        Ok(())
    }
}
