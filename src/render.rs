//! 终端输出：表格、详情与仪表盘

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use console_config::Theme;
use console_core::{Aggregate, BulkReport, Command, ConsoleView, Notification};
use console_domain::{Concurrency, Execution, Job, JobStatus, Member, NotificationKind};

const RESET: &str = "\x1b[0m";

/// 主题对应的配色，浅色主题不输出转义序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    theme: Theme,
}

impl Palette {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        match self.theme {
            Theme::Light => text.to_string(),
            Theme::Dark => format!("\x1b[{code}m{text}{RESET}"),
        }
    }

    pub fn status(&self, status: JobStatus) -> String {
        let code = match status {
            JobStatus::Success => "92",
            JobStatus::Failed => "91",
            JobStatus::Running => "96",
            JobStatus::Untriggered => "37",
            JobStatus::Disabled => "90",
        };
        self.paint(code, status.as_str())
    }

    pub fn notification(&self, notification: &Notification) -> String {
        let (code, marker) = match notification.kind {
            NotificationKind::Success => ("92", "✓"),
            NotificationKind::Warning => ("93", "!"),
            NotificationKind::Error => ("91", "✗"),
        };
        self.paint(code, &format!("{marker} {}", notification.message))
    }
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

fn concurrency_label(concurrency: Concurrency) -> &'static str {
    match concurrency {
        Concurrency::Allow => "allow",
        Concurrency::Forbid => "forbid",
    }
}

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

pub fn render_jobs_table(jobs: &[Job], aggregate: &Aggregate, palette: Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<28} {:<18} {:<12} {:<20} {:<20} {:<20}",
        "名称", "调度", "状态", "最近成功", "最近失败", "下次运行"
    );
    let _ = writeln!(out, "{}", "-".repeat(122));

    for job in jobs {
        let status = aggregate
            .status_of(&job.name)
            .map(|status| palette.status(status))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<28} {:<18} {:<12} {:<20} {:<20} {:<20}",
            job.title(),
            job.schedule,
            status,
            format_time(job.last_success),
            format_time(job.last_error),
            format_time(job.next),
        );
    }

    out
}

pub fn render_job_details(job: &Job, status: Option<JobStatus>, palette: Palette) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "任务详情:");
    let _ = writeln!(out, "  名称: {}", job.name);
    if !job.displayname.is_empty() {
        let _ = writeln!(out, "  显示名: {}", job.displayname);
    }
    let _ = writeln!(
        out,
        "  状态: {}",
        status.map(|s| palette.status(s)).unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  调度: {}", job.schedule);
    if !job.timezone.is_empty() {
        let _ = writeln!(out, "  时区: {}", job.timezone);
    }
    if !job.owner.is_empty() {
        let _ = writeln!(out, "  负责人: {} <{}>", job.owner, job.owner_email);
    }
    let _ = writeln!(out, "  已禁用: {}", job.disabled);
    let _ = writeln!(out, "  并发策略: {}", concurrency_label(job.concurrency));
    let _ = writeln!(out, "  重试次数: {}", job.retries);
    let _ = writeln!(out, "  成功/失败次数: {}/{}", job.success_count, job.error_count);
    let _ = writeln!(out, "  最近成功: {}", format_time(job.last_success));
    let _ = writeln!(out, "  最近失败: {}", format_time(job.last_error));
    let _ = writeln!(out, "  下次运行: {}", format_time(job.next));
    if !job.parent_job.is_empty() {
        let _ = writeln!(out, "  父任务: {}", job.parent_job);
    }
    if !job.dependent_jobs.is_empty() {
        let _ = writeln!(out, "  依赖任务: {}", job.dependent_jobs.join(", "));
    }
    if job.ephemeral {
        let _ = writeln!(out, "  临时任务，过期时间: {}", format_time(job.expires_at));
    }
    if !job.executor.is_empty() {
        let _ = writeln!(out, "  执行器: {}", job.executor);
    }

    let mut tags: Vec<_> = job.tags.iter().collect();
    tags.sort();
    for (key, value) in tags {
        let _ = writeln!(out, "  标签 {key}: {value}");
    }

    out
}

pub fn render_executions_table(executions: &[Execution]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:<8} {:<20} {:<20} {:<16} {:<8} {:<8}",
        "ID", "分组", "开始时间", "结束时间", "节点", "结果", "尝试"
    );
    let _ = writeln!(out, "{}", "-".repeat(108));

    for execution in executions {
        let outcome = match execution.outcome() {
            None => "running",
            Some(true) => "success",
            Some(false) => "failed",
        };
        let _ = writeln!(
            out,
            "{:<22} {:<8} {:<20} {:<20} {:<16} {:<8} {:<8}",
            execution.id,
            execution.group,
            format_time(execution.started_at),
            format_time(execution.finished_at),
            execution.node_name,
            outcome,
            execution.attempt,
        );
    }

    out
}

pub fn render_execution_details(execution: &Execution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "执行详情:");
    let _ = writeln!(out, "  任务: {}", execution.job_name);
    let _ = writeln!(out, "  ID: {}", execution.id);
    let _ = writeln!(out, "  节点: {}", execution.node_name);
    let _ = writeln!(out, "  开始时间: {}", format_time(execution.started_at));
    let _ = writeln!(out, "  结束时间: {}", format_time(execution.finished_at));
    let _ = writeln!(out, "  第 {} 次尝试", execution.attempt);
    let _ = writeln!(out, "  输出:");
    for line in execution.output.lines() {
        let _ = writeln!(out, "    {line}");
    }
    if execution.output_truncated {
        let _ = writeln!(out, "  (输出已截断)");
    }
    out
}

pub fn render_members_table(members: &[Member], leader: Option<&Member>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<22} {:<10} {:<8}",
        "节点", "地址", "状态", "leader"
    );
    let _ = writeln!(out, "{}", "-".repeat(66));

    for member in members {
        let is_leader = leader.is_some_and(|leader| leader.name == member.name);
        let _ = writeln!(
            out,
            "{:<24} {:<22} {:<10} {:<8}",
            member.name,
            format!("{}:{}", member.addr, member.port),
            member.status.label(),
            if is_leader { "*" } else { "" },
        );
    }

    out
}

pub fn render_bulk_report(command: Command, report: &BulkReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:?}: {} 成功, {} 失败",
        command,
        report.succeeded.len(),
        report.failed.len()
    );
    for (name, error) in &report.failed {
        let _ = writeln!(out, "  ✗ {name}: {error}");
    }
    out
}

/// 仪表盘：leader、计数、当前页、运行中执行、成员与通知
pub fn render_dashboard(view: &ConsoleView, notifications: &[Notification], palette: Palette) -> String {
    let mut out = String::new();
    let counters = view.counters();

    let _ = writeln!(
        out,
        "Leader: {}    更新时间: {}",
        view.leader_label(),
        format_time(Some(view.snapshot.fetched_at()))
    );
    if view.auth_required {
        let _ = writeln!(out, "认证已失效，请使用 --token 重新登录");
    }
    if let Some(error) = &view.last_error {
        let _ = writeln!(out, "上次刷新失败: {error}");
    }

    let _ = writeln!(
        out,
        "任务: {}  成功: {}  失败: {}  运行中: {}  未触发: {}  已禁用: {}",
        counters.total_jobs,
        counters.successful_jobs,
        counters.failed_jobs,
        counters.running_jobs,
        counters.untriggered_jobs,
        counters.disabled_jobs,
    );
    let _ = writeln!(
        out,
        "累计成功次数: {}  累计失败次数: {}",
        counters.success_count, counters.error_count
    );
    if let Some(delta) = view.delta.filter(|delta| !delta.is_zero()) {
        let _ = writeln!(
            out,
            "较上次: 新增失败 {}  新增成功 {}  失败任务 {}  运行中 {}",
            signed(delta.error_count),
            signed(delta.success_count),
            signed(delta.failed_jobs),
            signed(delta.running_jobs),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "第 {}/{} 页，共 {} 个任务",
        view.page_info.display_number(),
        view.page_info.count,
        view.page_info.total_items
    );
    out.push_str(&render_jobs_table(&view.page, &view.aggregate, palette));

    let busy: Vec<&Execution> = view.busy().collect();
    if !busy.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "运行中的执行:");
        for execution in busy {
            let _ = writeln!(
                out,
                "  {} @ {} 开始于 {}",
                execution.job_name,
                execution.node_name,
                format_time(execution.started_at)
            );
        }
    }

    let _ = writeln!(out);
    out.push_str(&render_members_table(view.members(), view.leader()));

    if !notifications.is_empty() {
        let _ = writeln!(out);
        for notification in notifications {
            let _ = writeln!(out, "{}", palette.notification(notification));
        }
    }

    out
}
