use thiserror::Error;

/// 控制台统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("网络错误: {0}")]
    Network(String),
    #[error("服务端错误: HTTP {status} - {body}")]
    Server { status: u16, body: String },
    #[error("认证失败: HTTP {status}")]
    Auth { status: u16 },
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    pub fn network_error<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }
    pub fn server_error<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 根据HTTP状态码构造错误，401/403 单独归类为认证失败
    pub fn from_status<S: Into<String>>(status: u16, body: S) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            _ => Self::server_error(status, body),
        }
    }
    pub fn is_auth(&self) -> bool {
        matches!(self, ConsoleError::Auth { .. })
    }
    pub fn user_message(&self) -> &str {
        match self {
            ConsoleError::Network(_) => "无法连接调度服务",
            ConsoleError::Server { .. } => "调度服务返回错误",
            ConsoleError::Auth { .. } => "认证已失效，请重新登录",
            ConsoleError::Validation(_) => "输入数据验证失败",
            ConsoleError::Serialization(_) => "无法解析调度服务响应",
            ConsoleError::Configuration(_) => "控制台配置有误",
            ConsoleError::Internal(_) => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ConsoleError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return ConsoleError::Serialization(err.to_string());
        }
        if err.is_timeout() {
            return ConsoleError::Network(format!("请求超时: {err}"));
        }
        ConsoleError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for ConsoleError {
    fn from(err: anyhow::Error) -> Self {
        ConsoleError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
