use crate::*;

#[test]
fn test_console_error_display() {
    let network_error = ConsoleError::Network("Connection refused".to_string());
    assert_eq!(network_error.to_string(), "网络错误: Connection refused");

    let server_error = ConsoleError::server_error(500, "boom");
    assert_eq!(server_error.to_string(), "服务端错误: HTTP 500 - boom");

    let auth_error = ConsoleError::Auth { status: 401 };
    assert_eq!(auth_error.to_string(), "认证失败: HTTP 401");

    let validation_error = ConsoleError::validation_error("Invalid input");
    assert_eq!(validation_error.to_string(), "数据验证失败: Invalid input");

    let config_error = ConsoleError::config_error("Missing base_url");
    assert_eq!(config_error.to_string(), "配置错误: Missing base_url");
}

#[test]
fn test_from_status_classification() {
    assert!(ConsoleError::from_status(401, "").is_auth());
    assert!(ConsoleError::from_status(403, "forbidden").is_auth());

    let error = ConsoleError::from_status(404, "job not found");
    assert!(matches!(error, ConsoleError::Server { status: 404, .. }));
    assert!(!error.is_auth());

    let error = ConsoleError::from_status(502, "bad gateway");
    assert!(matches!(error, ConsoleError::Server { status: 502, .. }));
}

#[test]
fn test_user_message() {
    assert_eq!(
        ConsoleError::Auth { status: 401 }.user_message(),
        "认证已失效，请重新登录"
    );
    assert_eq!(
        ConsoleError::validation_error("x").user_message(),
        "输入数据验证失败"
    );
}

#[test]
fn test_from_serde_json_error() {
    let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: ConsoleError = err.into();
    assert!(matches!(error, ConsoleError::Serialization(_)));
}

#[test]
fn test_from_anyhow_error() {
    let error: ConsoleError = anyhow::anyhow!("unexpected").into();
    assert!(matches!(error, ConsoleError::Internal(msg) if msg == "unexpected"));
}
