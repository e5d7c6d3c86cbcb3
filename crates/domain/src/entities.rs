use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Concurrency, MemberStatus, TotalCount};
use crate::wire::{null_as_default, nullable_time};
use console_errors::{ConsoleError, ConsoleResult};

/// 调度任务。`name` 唯一，同时作为id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub name: String,
    pub displayname: String,
    pub schedule: String, // cron 表达式或 @every 之类的快捷写法
    pub timezone: String,
    pub owner: String,
    pub owner_email: String,
    pub disabled: bool,
    pub concurrency: Concurrency,
    pub retries: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    pub parent_job: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dependent_jobs: Vec<String>,
    // 以下配置块原样透传，控制台不解释
    pub processors: serde_json::Value,
    pub executor: String,
    pub executor_config: serde_json::Value,
    pub success_count: u64,
    pub error_count: u64,
    #[serde(with = "nullable_time")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(with = "nullable_time")]
    pub last_error: Option<DateTime<Utc>>,
    #[serde(with = "nullable_time")]
    pub next: Option<DateTime<Utc>>,
    pub ephemeral: bool,
    #[serde(with = "nullable_time")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            ..Default::default()
        }
    }

    /// 展示名，未设置时回退到 `name`
    pub fn title(&self) -> &str {
        if self.displayname.is_empty() {
            &self.name
        } else {
            &self.displayname
        }
    }

    pub fn is_untriggered(&self) -> bool {
        self.last_success.is_none() && self.last_error.is_none()
    }
}

/// 任务的一次执行记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Execution {
    pub id: String,
    pub job_name: String,
    pub group: i64, // 关联同一次触发的重试与链式执行
    #[serde(with = "nullable_time")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "nullable_time")]
    pub finished_at: Option<DateTime<Utc>>,
    pub node_name: String,
    pub success: bool,
    pub attempt: u32,
    pub output: String,
    pub output_truncated: bool,
}

impl Execution {
    pub fn is_running(&self) -> bool {
        self.finished_at.is_none()
    }

    /// `finished_at` 为空时 `success` 没有意义
    pub fn outcome(&self) -> Option<bool> {
        if self.is_running() {
            None
        } else {
            Some(self.success)
        }
    }
}

/// 集群节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    pub name: String,
    pub addr: String,
    pub port: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: HashMap<String, String>,
    pub status: MemberStatus,
}

/// 一页任务列表及后端返回的总数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: Option<TotalCount>,
}

/// 一次轮询拿到的不可变状态
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    jobs: Vec<Job>,
    running: Vec<Execution>,
    members: Vec<Member>,
    leader: Option<Member>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// 任务名在快照内必须唯一
    pub fn new(
        jobs: Vec<Job>,
        running: Vec<Execution>,
        members: Vec<Member>,
        leader: Option<Member>,
    ) -> ConsoleResult<Self> {
        let mut seen = HashSet::with_capacity(jobs.len());
        for job in &jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(ConsoleError::validation_error(format!(
                    "duplicate job name in snapshot: {}",
                    job.name
                )));
            }
        }
        Ok(Self {
            jobs,
            running,
            members,
            leader,
            fetched_at: Utc::now(),
        })
    }

    pub fn empty() -> Self {
        Self {
            jobs: Vec::new(),
            running: Vec::new(),
            members: Vec::new(),
            leader: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn running(&self) -> &[Execution] {
        &self.running
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn leader(&self) -> Option<&Member> {
        self.leader.as_ref()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// 存在未结束执行的任务名
    pub fn running_job_names(&self) -> HashSet<&str> {
        self.running
            .iter()
            .filter(|execution| execution.is_running())
            .map(|execution| execution.job_name.as_str())
            .collect()
    }
}
