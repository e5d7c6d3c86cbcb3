//! Test data builders for creating console entities
//!
//! Timestamps are given as seconds after a fixed epoch so that orderings in
//! tests stay obvious; see [`crate::helpers::at`].

use std::collections::HashMap;

use console_domain::{Execution, Job, Member, MemberStatus};

use crate::helpers::at;

/// Builder for creating test Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            job: Job::new(name, "@every 1m"),
        }
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.job.schedule = schedule.to_string();
        self
    }

    pub fn with_displayname(mut self, displayname: &str) -> Self {
        self.job.displayname = displayname.to_string();
        self
    }

    /// 最近一次成功时间（相对固定基准的秒数）
    pub fn succeeded_at(mut self, secs: i64) -> Self {
        self.job.last_success = Some(at(secs));
        self.job.success_count += 1;
        self
    }

    pub fn failed_at(mut self, secs: i64) -> Self {
        self.job.last_error = Some(at(secs));
        self.job.error_count += 1;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.job.disabled = true;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.job.parent_job = parent.to_string();
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.job.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Builder for creating test Execution entities
pub struct ExecutionBuilder {
    execution: Execution,
}

impl ExecutionBuilder {
    /// 默认是一次尚未结束的执行
    pub fn new(job_name: &str) -> Self {
        Self {
            execution: Execution {
                id: "1".to_string(),
                job_name: job_name.to_string(),
                group: 1,
                started_at: Some(at(0)),
                finished_at: None,
                node_name: "node-1".to_string(),
                success: false,
                attempt: 1,
                output: String::new(),
                output_truncated: false,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.execution.id = id.to_string();
        self
    }

    pub fn finished(mut self, secs: i64, success: bool) -> Self {
        self.execution.finished_at = Some(at(secs));
        self.execution.success = success;
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.execution.output = output.to_string();
        self
    }

    pub fn on_node(mut self, node_name: &str) -> Self {
        self.execution.node_name = node_name.to_string();
        self
    }

    pub fn build(self) -> Execution {
        self.execution
    }
}

/// Builder for creating test Member entities
pub struct MemberBuilder {
    member: Member,
}

impl MemberBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            member: Member {
                name: name.to_string(),
                addr: "127.0.0.1".to_string(),
                port: 8946,
                tags: HashMap::new(),
                status: MemberStatus::Alive,
            },
        }
    }

    pub fn with_addr(mut self, addr: &str, port: u16) -> Self {
        self.member.addr = addr.to_string();
        self.member.port = port;
        self
    }

    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.member.status = status;
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.member.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Member {
        self.member
    }
}
