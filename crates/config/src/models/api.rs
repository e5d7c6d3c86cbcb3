use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token，启用认证时附加在每个请求上
    #[serde(default)]
    pub token: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout_seconds: 30,
        }
    }
}

impl ApiConfig {
    /// 去掉末尾的 `/`，方便拼接路径
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl ConfigValidator for ApiConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_http_url(&self.base_url, "api.base_url")?;
        ValidationUtils::validate_positive(self.request_timeout_seconds, "api.request_timeout_seconds")?;
        if let Some(token) = &self.token {
            ValidationUtils::validate_not_empty(token, "api.token")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_config_validation() {
        let mut config = ApiConfig::default();
        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.token = Some(" ".to_string());
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_base_url() {
        let mut config = ApiConfig::default();
        config.base_url = "http://scheduler:8080/v1/".to_string();
        assert_eq!(config.normalized_base_url(), "http://scheduler:8080/v1");
    }
}
