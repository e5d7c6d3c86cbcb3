use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub page_size: usize,
    /// 执行列表请求的输出截断长度
    pub output_size_limit: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            page_size: 20,
            output_size_limit: 1024,
        }
    }
}

impl ConfigValidator for PollingConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive(self.interval_ms, "polling.interval_ms")?;
        ValidationUtils::validate_positive(self.page_size as u64, "polling.page_size")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    pub dismiss_after_ms: u64,
    /// 同时可见的通知上限，超出时淘汰最早的一条
    pub capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 2000,
            capacity: 16,
        }
    }
}

impl ConfigValidator for NotificationConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive(self.dismiss_after_ms, "notifications.dismiss_after_ms")?;
        ValidationUtils::validate_positive(self.capacity as u64, "notifications.capacity")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferencesConfig {
    pub path: String,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: "console-preferences.toml".to_string(),
        }
    }
}

impl ConfigValidator for PreferencesConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.path, "preferences.path")
    }
}
