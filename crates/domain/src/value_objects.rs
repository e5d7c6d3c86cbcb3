use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use console_errors::{ConsoleError, ConsoleResult};

/// 由快照推导出的任务状态，不由后端存储
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
    Running,
    Untriggered,
    /// 已禁用的任务走单独的展示通道，不参与成功/失败统计
    Disabled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Running => "running",
            JobStatus::Untriggered => "untriggered",
            JobStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "running" => Ok(JobStatus::Running),
            "untriggered" => Ok(JobStatus::Untriggered),
            "disabled" => Ok(JobStatus::Disabled),
            _ => Err(format!(
                "Invalid job status: {s}. Valid statuses: success, failed, running, untriggered, disabled"
            )),
        }
    }
}

/// 集群成员状态，线上以整数编码传输
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum MemberStatus {
    None,
    Alive,
    Leaving,
    Left,
    Failed,
}

impl MemberStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::None => "none",
            MemberStatus::Alive => "alive",
            MemberStatus::Leaving => "leaving",
            MemberStatus::Left => "left",
            MemberStatus::Failed => "failed",
        }
    }
}

impl TryFrom<u8> for MemberStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MemberStatus::None),
            1 => Ok(MemberStatus::Alive),
            2 => Ok(MemberStatus::Leaving),
            3 => Ok(MemberStatus::Left),
            4 => Ok(MemberStatus::Failed),
            _ => Err(format!("unknown member status code: {code}")),
        }
    }
}

impl From<MemberStatus> for u8 {
    fn from(status: MemberStatus) -> Self {
        match status {
            MemberStatus::None => 0,
            MemberStatus::Alive => 1,
            MemberStatus::Leaving => 2,
            MemberStatus::Left => 3,
            MemberStatus::Failed => 4,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 任务并发策略
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Concurrency {
    #[default]
    Allow,
    Forbid,
}

impl FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "allow" => Ok(Concurrency::Allow),
            "forbid" => Ok(Concurrency::Forbid),
            _ => Err(format!(
                "invalid concurrency policy value {s:?}, use \"allow\" or \"forbid\""
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Concurrency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.unwrap_or_default()
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// `X-Total-Count` 响应头，格式为 `<start>-<end>/<total>` 或单独的 `<total>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalCount {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub total: u64,
}

impl FromStr for TotalCount {
    type Err = ConsoleError;

    fn from_str(s: &str) -> ConsoleResult<Self> {
        let invalid = || ConsoleError::Serialization(format!("invalid X-Total-Count header: {s:?}"));
        let s = s.trim();
        let (range, total) = match s.rsplit_once('/') {
            Some((range, total)) => (Some(range), total),
            None => (None, s),
        };
        let total = total.trim().parse::<u64>().map_err(|_| invalid())?;
        let (start, end) = match range {
            Some(range) => {
                let (start, end) = range.split_once('-').ok_or_else(invalid)?;
                let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
                let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
                (Some(start), Some(end))
            }
            None => (None, None),
        };
        Ok(Self { start, end, total })
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sort order: {s}. Valid orders: asc, desc")),
        }
    }
}

/// 任务列表查询参数，对应 `GET /jobs` 的查询串
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct JobQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(rename = "_sort", skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(rename = "_order", skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(rename = "_start", skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(rename = "_end", skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = Some(order);
        self
    }

    /// 按页号（从0开始）设置 `_start`/`_end` 区间
    pub fn with_page(mut self, page: u64, per_page: u64) -> Self {
        self.start = Some(page * per_page);
        self.end = Some((page + 1) * per_page);
        self
    }
}
