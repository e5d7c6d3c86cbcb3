use std::io::{self, BufRead, Read, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use console_client::{CredentialStore, HttpSchedulerApi};
use console_config::{AppConfig, ConfigValidator, PreferenceStore, Theme};
use console_core::{
    aggregate, filter_by_status, BulkReport, Command, CommandDispatcher, NotificationCenter,
    NotificationEvent, PollingLoop, TickOutcome,
};
use console_domain::{Job, JobQuery, SchedulerApi, Snapshot};

use crate::cli::{Commands, ConfigActions, ExecutionActions, JobActions, ListArgs, WatchArgs};
use crate::render::{self, Palette};

/// 控制台应用：持有API客户端、轮询循环、命令派发器与通知中心
pub struct Application {
    config: AppConfig,
    credentials: Arc<CredentialStore>,
    api: Arc<dyn SchedulerApi>,
    notifications: NotificationCenter,
    polling: Arc<PollingLoop>,
    dispatcher: CommandDispatcher,
    preferences: PreferenceStore,
}

impl Application {
    /// 使用HTTP客户端创建应用
    pub fn new(config: AppConfig) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::new(config.api.token.clone()));
        let api = HttpSchedulerApi::new(&config.api, Arc::clone(&credentials))
            .context("创建调度服务客户端失败")?;
        Self::with_api(config, Arc::new(api), credentials)
    }

    pub fn with_api(
        config: AppConfig,
        api: Arc<dyn SchedulerApi>,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self> {
        let page_size = NonZeroUsize::new(config.polling.page_size)
            .ok_or_else(|| anyhow!("polling.page_size 必须大于0"))?;

        let notifications = NotificationCenter::from_config(&config.notifications);
        let notifier = Arc::new(notifications.clone());
        let polling = Arc::new(PollingLoop::new(
            Arc::clone(&api),
            notifier.clone(),
            Arc::clone(&credentials),
            page_size,
        ));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&api),
            notifier,
            polling.clone(),
            Arc::clone(&credentials),
        );
        let preferences = PreferenceStore::new(&config.preferences.path);

        Ok(Self {
            config,
            credentials,
            api,
            notifications,
            polling,
            dispatcher,
            preferences,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn polling(&self) -> &Arc<PollingLoop> {
        &self.polling
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// 使用新令牌登录，同时解除认证失效导致的轮询暂停
    pub async fn login(&self, token: &str) {
        self.polling.login(token).await;
        debug!("Authenticated: {}", self.credentials.is_authenticated());
    }

    /// 读取偏好主题，偏好文件损坏时退回浅色
    pub fn palette(&self) -> Palette {
        match self.preferences.theme() {
            Ok(theme) => Palette::new(theme),
            Err(e) => {
                warn!("读取偏好失败，使用默认主题: {}", e);
                Palette::new(Theme::default())
            }
        }
    }

    /// 执行一次性命令并返回要输出的文本
    pub async fn execute(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Watch(_) => Err(anyhow!("watch 命令需要通过 Application::watch 运行")),
            Commands::Jobs(jobs) => self.handle_job_command(jobs.action).await,
            Commands::Executions(executions) => {
                self.handle_execution_command(executions.action).await
            }
            Commands::Busy => {
                let busy = self.api.busy().await?;
                Ok(render::render_executions_table(&busy))
            }
            Commands::Members => self.members().await,
            Commands::Leader => self.leader().await,
            Commands::Theme { theme } => self.theme(theme),
            Commands::Config(config) => config_command(config.action, &self.config),
        }
    }

    async fn handle_job_command(&self, action: JobActions) -> Result<String> {
        match action {
            JobActions::List(args) => self.list_jobs(&args).await,
            JobActions::Show { name } => {
                let (job, busy) = futures::join!(self.api.get_job(&name), self.api.busy());
                let job = job?;
                let busy = busy.unwrap_or_else(|e| {
                    warn!("获取运行中执行失败: {}", e);
                    Vec::new()
                });
                let snapshot = Snapshot::new(vec![job.clone()], busy, Vec::new(), None)?;
                let status = aggregate(&snapshot).status_of(&job.name);
                Ok(render::render_job_details(&job, status, self.palette()))
            }
            JobActions::Run { names } => self.dispatch(Command::Run, &names).await,
            JobActions::Toggle { names } => self.dispatch(Command::Toggle, &names).await,
            JobActions::Delete { names, force } => {
                if !force && !confirm(&format!("确定要删除任务 {} 吗？", names.join(", ")))? {
                    return Ok("删除操作已取消\n".to_string());
                }
                self.dispatch(Command::Delete, &names).await
            }
            JobActions::Save { file } => {
                let raw = read_job_definition(&file).await?;
                self.dispatcher.upsert(&raw).await?;
                Ok(self.notification_lines())
            }
        }
    }

    async fn list_jobs(&self, args: &ListArgs) -> Result<String> {
        let mut query = JobQuery::new().with_page(args.page, args.page_size);
        if let Some(q) = &args.q {
            query = query.with_search(q.clone());
        }
        if let Some(disabled) = args.disabled {
            query = query.with_disabled(disabled);
        }
        if let Some(sort) = &args.sort {
            query = query.sorted_by(sort.clone(), args.order.into());
        }

        let (page, busy) = futures::join!(self.api.list_jobs(&query), self.api.busy());
        let page = page?;
        let busy = busy.unwrap_or_else(|e| {
            warn!("获取运行中执行失败: {}", e);
            Vec::new()
        });
        let total = page
            .total
            .map(|count| count.total)
            .unwrap_or(page.jobs.len() as u64);

        let snapshot = Snapshot::new(page.jobs, busy, Vec::new(), None)?;
        let aggregate = aggregate(&snapshot);
        let jobs: Vec<Job> = match args.status {
            Some(status) => filter_by_status(snapshot.jobs(), &aggregate, status)
                .into_iter()
                .cloned()
                .collect(),
            None => snapshot.jobs().to_vec(),
        };

        let mut out = render::render_jobs_table(&jobs, &aggregate, self.palette());
        out.push_str(&format!(
            "\n第 {} 页，本页 {} 个，共 {} 个任务\n",
            args.page + 1,
            jobs.len(),
            total
        ));
        Ok(out)
    }

    /// 单个任务走单项命令，多个任务走批量命令
    async fn dispatch(&self, command: Command, names: &[String]) -> Result<String> {
        if let [name] = names {
            let result = match command {
                Command::Run => self.dispatcher.run(name).await,
                Command::Toggle => self.dispatcher.toggle(name).await,
                Command::Delete => self.dispatcher.delete(name).await,
                Command::Save => return Err(anyhow!("保存任务需要任务定义")),
            };
            result?;
            return Ok(self.notification_lines());
        }

        let report = match command {
            Command::Run => self.dispatcher.run_many(names).await,
            Command::Toggle => self.dispatcher.toggle_many(names).await,
            Command::Delete => self.dispatcher.delete_many(names).await,
            Command::Save => BulkReport::default(),
        };
        let rendered = render::render_bulk_report(command, &report);
        if report.is_success() {
            Ok(rendered)
        } else {
            Err(anyhow!(rendered))
        }
    }

    async fn handle_execution_command(&self, action: ExecutionActions) -> Result<String> {
        match action {
            ExecutionActions::List {
                job,
                output_size_limit,
            } => {
                let limit = output_size_limit.unwrap_or(self.config.polling.output_size_limit);
                let executions = self.api.list_executions(&job, Some(limit)).await?;
                Ok(render::render_executions_table(&executions))
            }
            ExecutionActions::Show { job, id } => {
                let execution = self.api.get_execution(&job, &id).await?;
                Ok(render::render_execution_details(&execution))
            }
        }
    }

    async fn members(&self) -> Result<String> {
        let (members, leader) = futures::join!(self.api.members(), self.api.leader());
        let members = members?;
        let leader = match leader {
            Ok(leader) => Some(leader),
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => {
                warn!("获取leader失败: {}", e);
                None
            }
        };
        Ok(render::render_members_table(&members, leader.as_ref()))
    }

    async fn leader(&self) -> Result<String> {
        match self.api.leader().await {
            Ok(leader) => Ok(format!(
                "Leader: {} ({}:{})\n",
                leader.name, leader.addr, leader.port
            )),
            Err(e) if e.is_auth() => Err(e.into()),
            Err(e) => {
                warn!("获取leader失败: {}", e);
                Ok("Leader: no leader\n".to_string())
            }
        }
    }

    fn theme(&self, theme: Option<Theme>) -> Result<String> {
        match theme {
            Some(theme) => {
                self.preferences.set_theme(theme)?;
                info!("主题已切换为 {}", theme);
                Ok(format!("主题已设置为 {theme}\n"))
            }
            None => Ok(format!("当前主题: {}\n", self.preferences.theme()?)),
        }
    }

    fn notification_lines(&self) -> String {
        let palette = self.palette();
        self.notifications
            .active()
            .iter()
            .map(|notification| format!("{}\n", palette.notification(notification)))
            .collect()
    }

    /// 渲染当前仪表盘
    pub async fn dashboard(&self) -> String {
        let view = self.polling.view().await;
        render::render_dashboard(&view, &self.notifications.active(), self.palette())
    }

    /// 持续轮询，每次刷新后把仪表盘交给 `output`
    ///
    /// 收到关闭信号或达到 `--ticks` 次成功刷新后停止，返回成功刷新次数。
    pub async fn watch<F>(
        &self,
        args: &WatchArgs,
        mut shutdown_rx: broadcast::Receiver<()>,
        mut output: F,
    ) -> Result<u64>
    where
        F: FnMut(&str),
    {
        let interval =
            Duration::from_millis(args.interval_ms.unwrap_or(self.config.polling.interval_ms));
        let mut outcomes = self.polling.subscribe();
        let mut events = self.notifications.subscribe();

        self.polling.start(interval).await?;
        info!("开始监控 {}，间隔 {:?}", self.config.api.base_url, interval);

        let mut applied = 0u64;
        loop {
            tokio::select! {
                outcome = outcomes.recv() => match outcome {
                    Ok(TickOutcome::Applied) => {
                        applied += 1;
                        output(&self.dashboard().await);
                        if args.ticks.is_some_and(|ticks| applied >= ticks) {
                            debug!("Reached {} applied ticks", applied);
                            break;
                        }
                    }
                    Ok(TickOutcome::Failed) | Ok(TickOutcome::AuthRequired) => {
                        output(&self.dashboard().await);
                    }
                    Ok(TickOutcome::Skipped) | Ok(TickOutcome::Discarded) => {}
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Dashboard lagged behind {} tick outcomes", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                event = events.recv() => {
                    // 通知消失后刷新，避免过期通知一直显示
                    if let Ok(NotificationEvent::Dismissed(_)) = event {
                        output(&self.dashboard().await);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止监控");
                    break;
                }
            }
        }

        self.polling.stop().await;
        Ok(applied)
    }
}

/// 配置子命令，不需要连接调度服务
pub fn config_command(action: ConfigActions, config: &AppConfig) -> Result<String> {
    match action {
        ConfigActions::Show => config.to_toml(),
        ConfigActions::Validate => {
            config.validate()?;
            Ok(format!("配置有效，API地址: {}\n", config.api.base_url))
        }
        ConfigActions::Example => {
            let example = AppConfig::default().to_toml()?;
            Ok(format!("# 监控控制台配置示例\n\n{example}"))
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/N): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn read_job_definition(file: &str) -> Result<String> {
    if file == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("从标准输入读取任务定义失败")?;
        return Ok(raw);
    }
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("读取任务定义文件失败: {file}"))
}
