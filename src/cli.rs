use clap::{Args, Parser, Subcommand, ValueEnum};

use console_config::{AppConfig, ConfigResult, ConfigValidator, LogLevel, OutputFormat, Theme};
use console_domain::{JobStatus, SortOrder};

/// CLI应用程序主结构
#[derive(Parser, Debug)]
#[command(name = "scheduler-console")]
#[command(version)]
#[command(about = "分布式任务调度系统 - 监控控制台")]
#[command(long_about = "轮询调度服务的任务、执行与集群成员状态，并提供运行、启停、删除等操作")]
pub struct CliApp {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 调度服务API地址，覆盖配置文件
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Bearer令牌
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// 日志级别
    #[arg(short, long, global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// 日志格式
    #[arg(long, global = true, value_parser = parse_output_format)]
    pub log_format: Option<OutputFormat>,
}

impl CliApp {
    /// 命令行参数覆盖配置文件，覆盖后重新校验
    pub fn apply_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let Some(api_url) = &self.api_url {
            config.api.base_url = api_url.clone();
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Commands::Watch(args) = &self.command {
            if let Some(interval_ms) = args.interval_ms {
                config.polling.interval_ms = interval_ms;
            }
            if let Some(page_size) = args.page_size {
                config.polling.page_size = page_size;
            }
        }
        config.validate()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 持续轮询并刷新仪表盘
    Watch(WatchArgs),
    /// 任务管理
    Jobs(JobCommands),
    /// 执行记录
    Executions(ExecutionCommands),
    /// 正在运行的执行
    Busy,
    /// 集群成员
    Members,
    /// 当前leader
    Leader,
    /// 查看或设置主题
    Theme {
        #[arg(value_parser = parse_theme)]
        theme: Option<Theme>,
    },
    /// 配置管理
    Config(ConfigCommands),
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// 轮询间隔（毫秒），覆盖配置
    #[arg(long)]
    pub interval_ms: Option<u64>,
    /// 每页任务数，覆盖配置
    #[arg(long)]
    pub page_size: Option<usize>,
    /// 成功刷新N次后退出
    #[arg(long)]
    pub ticks: Option<u64>,
}

#[derive(Args, Debug)]
pub struct JobCommands {
    #[command(subcommand)]
    pub action: JobActions,
}

#[derive(Subcommand, Debug)]
pub enum JobActions {
    /// 列出任务
    List(ListArgs),
    /// 查看任务详情
    Show { name: String },
    /// 立即运行任务
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// 启用/禁用任务
    Toggle {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// 删除任务
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        /// 强制删除 (不询问确认)
        #[arg(short, long)]
        force: bool,
    },
    /// 从JSON文件创建或更新任务，`-` 表示标准输入
    Save { file: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// 搜索关键字
    #[arg(short, long)]
    pub q: Option<String>,
    /// 任务状态过滤
    #[arg(short, long, value_parser = parse_job_status)]
    pub status: Option<JobStatus>,
    /// 只显示已禁用/已启用的任务
    #[arg(long)]
    pub disabled: Option<bool>,
    /// 排序字段
    #[arg(long)]
    pub sort: Option<String>,
    /// 排序方向
    #[arg(long, value_enum, default_value_t = OrderArg::Asc)]
    pub order: OrderArg,
    /// 页号，从0开始
    #[arg(short, long, default_value = "0")]
    pub page: u64,
    /// 每页显示数量
    #[arg(long, default_value = "20")]
    pub page_size: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderArg {
    #[default]
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortOrder::Asc,
            OrderArg::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExecutionCommands {
    #[command(subcommand)]
    pub action: ExecutionActions,
}

#[derive(Subcommand, Debug)]
pub enum ExecutionActions {
    /// 列出任务的执行记录
    List {
        job: String,
        /// 输出截断长度，覆盖配置
        #[arg(long)]
        output_size_limit: Option<usize>,
    },
    /// 查看完整输出
    Show { job: String, id: String },
}

#[derive(Args, Debug)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub action: ConfigActions,
}

#[derive(Subcommand, Debug)]
pub enum ConfigActions {
    /// 显示当前配置
    Show,
    /// 验证配置文件
    Validate,
    /// 生成示例配置
    Example,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    s.parse()
}

fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

fn parse_theme(s: &str) -> Result<Theme, String> {
    s.parse()
}

fn parse_job_status(s: &str) -> Result<JobStatus, String> {
    s.parse()
}
