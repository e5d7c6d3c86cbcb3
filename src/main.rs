use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use console_config::{AppConfig, LogLevel, OutputFormat};
use scheduler_console::{wait_for_shutdown_signal, Application, CliApp, Commands, ShutdownManager};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = CliApp::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })?;

    cli.apply_overrides(&mut config)
        .context("命令行参数覆盖后的配置无效")?;

    init_logging(config.logging.level, config.logging.format)?;
    info!("调度服务API: {}", config.api.base_url);

    let app = Application::new(config)?;
    if let Some(token) = &cli.token {
        app.login(token).await;
    }

    match cli.command {
        Commands::Watch(args) => {
            let shutdown_manager = ShutdownManager::new();
            let shutdown_rx = shutdown_manager.subscribe().await;

            let signal_manager = shutdown_manager.clone();
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                signal_manager.shutdown().await;
            });

            let result = app
                .watch(&args, shutdown_rx, |dashboard| {
                    // 清屏后重绘
                    print!("\x1b[2J\x1b[H{dashboard}");
                })
                .await;
            match result {
                Ok(applied) => info!("监控结束，共刷新 {} 次", applied),
                Err(e) => {
                    error!("监控失败: {e}");
                    return Err(e);
                }
            }
        }
        command => {
            let output = app.execute(command).await?;
            print!("{output}");
        }
    }

    Ok(())
}

/// 初始化日志系统，输出到stderr以免干扰表格
fn init_logging(level: LogLevel, format: OutputFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}
