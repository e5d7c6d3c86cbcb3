//! 任务状态推导与集群计数
//!
//! 所有函数都是快照的纯函数：对同一快照重复计算得到完全相同的结果，
//! 不跨调用累积任何状态。

use std::collections::{BTreeMap, HashSet};

use console_domain::{Job, JobStatus, Snapshot};

/// 推导单个任务的状态
///
/// 优先级：禁用 > 运行中 > 未触发 > 比较最近成功/失败时间。
/// 两个时间相等时判为失败，成功必须严格更晚。
pub fn derive_status(job: &Job, running: &HashSet<&str>) -> JobStatus {
    if job.disabled {
        return JobStatus::Disabled;
    }
    if running.contains(job.name.as_str()) {
        return JobStatus::Running;
    }
    match (job.last_success, job.last_error) {
        (None, None) => JobStatus::Untriggered,
        (Some(_), None) => JobStatus::Success,
        (None, Some(_)) => JobStatus::Failed,
        (Some(success), Some(error)) if success > error => JobStatus::Success,
        (Some(_), Some(_)) => JobStatus::Failed,
    }
}

/// 集群级计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetCounters {
    pub total_jobs: usize,
    /// 所有任务 `success_count` 之和
    pub success_count: u64,
    /// 所有任务 `error_count` 之和
    pub error_count: u64,
    pub successful_jobs: usize,
    pub failed_jobs: usize,
    pub running_jobs: usize,
    pub untriggered_jobs: usize,
    pub disabled_jobs: usize,
}

impl FleetCounters {
    fn record(&mut self, job: &Job, status: JobStatus) {
        self.total_jobs += 1;
        self.success_count = self.success_count.saturating_add(job.success_count);
        self.error_count = self.error_count.saturating_add(job.error_count);
        match status {
            JobStatus::Success => self.successful_jobs += 1,
            JobStatus::Failed => self.failed_jobs += 1,
            JobStatus::Running => self.running_jobs += 1,
            JobStatus::Untriggered => self.untriggered_jobs += 1,
            JobStatus::Disabled => self.disabled_jobs += 1,
        }
    }

    /// 与上一次轮询相比的变化量
    pub fn delta(&self, previous: &FleetCounters) -> FleetDelta {
        fn diff_usize(now: usize, before: usize) -> i64 {
            now as i64 - before as i64
        }
        fn diff_u64(now: u64, before: u64) -> i64 {
            (i128::from(now) - i128::from(before)).clamp(i64::MIN as i128, i64::MAX as i128) as i64
        }

        FleetDelta {
            total_jobs: diff_usize(self.total_jobs, previous.total_jobs),
            success_count: diff_u64(self.success_count, previous.success_count),
            error_count: diff_u64(self.error_count, previous.error_count),
            successful_jobs: diff_usize(self.successful_jobs, previous.successful_jobs),
            failed_jobs: diff_usize(self.failed_jobs, previous.failed_jobs),
            running_jobs: diff_usize(self.running_jobs, previous.running_jobs),
        }
    }
}

/// 两次快照之间的计数变化，负数表示减少
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetDelta {
    pub total_jobs: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub successful_jobs: i64,
    pub failed_jobs: i64,
    pub running_jobs: i64,
}

impl FleetDelta {
    pub fn is_zero(&self) -> bool {
        *self == FleetDelta::default()
    }
}

/// 一次聚合的完整结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub statuses: BTreeMap<String, JobStatus>,
    pub counters: FleetCounters,
}

impl Aggregate {
    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.statuses.get(name).copied()
    }
}

pub fn aggregate(snapshot: &Snapshot) -> Aggregate {
    let running = snapshot.running_job_names();
    let mut result = Aggregate::default();

    for job in snapshot.jobs() {
        let status = derive_status(job, &running);
        result.counters.record(job, status);
        result.statuses.insert(job.name.clone(), status);
    }

    result
}

/// 按推导出的状态筛选任务，保持原有顺序
pub fn filter_by_status<'a>(
    jobs: &'a [Job],
    aggregate: &Aggregate,
    status: JobStatus,
) -> Vec<&'a Job> {
    jobs.iter()
        .filter(|job| aggregate.status_of(&job.name) == Some(status))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_testing_utils::{at, ExecutionBuilder, JobBuilder};

    fn snapshot(jobs: Vec<Job>) -> Snapshot {
        Snapshot::new(jobs, vec![], vec![], None).unwrap()
    }

    #[test]
    fn test_derive_status_precedence() {
        let running: HashSet<&str> = ["busy", "off"].into_iter().collect();

        let off = JobBuilder::new("off").succeeded_at(10).disabled().build();
        assert_eq!(derive_status(&off, &running), JobStatus::Disabled);

        let busy = JobBuilder::new("busy").failed_at(10).build();
        assert_eq!(derive_status(&busy, &running), JobStatus::Running);

        let fresh = JobBuilder::new("fresh").build();
        assert_eq!(derive_status(&fresh, &running), JobStatus::Untriggered);

        let ok = JobBuilder::new("ok").failed_at(1).succeeded_at(2).build();
        assert_eq!(derive_status(&ok, &running), JobStatus::Success);

        let bad = JobBuilder::new("bad").succeeded_at(1).failed_at(2).build();
        assert_eq!(derive_status(&bad, &running), JobStatus::Failed);
    }

    #[test]
    fn test_equal_timestamps_resolve_to_failed() {
        let mut job = JobBuilder::new("tie").build();
        job.last_success = Some(at(100));
        job.last_error = Some(at(100));
        assert_eq!(derive_status(&job, &HashSet::new()), JobStatus::Failed);
    }

    #[test]
    fn test_only_unfinished_executions_mark_running() {
        let jobs = vec![
            JobBuilder::new("a").succeeded_at(1).build(),
            JobBuilder::new("b").succeeded_at(1).build(),
        ];
        let running = vec![
            ExecutionBuilder::new("a").build(),
            ExecutionBuilder::new("b").finished(5, true).build(),
        ];
        let snapshot = Snapshot::new(jobs, running, vec![], None).unwrap();

        let result = aggregate(&snapshot);
        assert_eq!(result.status_of("a"), Some(JobStatus::Running));
        assert_eq!(result.status_of("b"), Some(JobStatus::Success));
        assert_eq!(result.counters.running_jobs, 1);
    }

    #[test]
    fn test_counters_sum_backend_counts() {
        let mut a = JobBuilder::new("a").succeeded_at(3).build();
        a.success_count = 7;
        a.error_count = 2;
        let mut b = JobBuilder::new("b").failed_at(3).build();
        b.success_count = 1;
        b.error_count = 4;

        let counters = aggregate(&snapshot(vec![a, b])).counters;
        assert_eq!(counters.success_count, 8);
        assert_eq!(counters.error_count, 6);
        assert_eq!(counters.total_jobs, 2);
    }

    #[test]
    fn test_bucket_sum_never_exceeds_total() {
        let jobs = vec![
            JobBuilder::new("a").succeeded_at(1).build(),
            JobBuilder::new("b").build(),
            JobBuilder::new("c").failed_at(1).build(),
            JobBuilder::new("d").succeeded_at(1).disabled().build(),
        ];
        let counters = aggregate(&snapshot(jobs)).counters;
        assert!(counters.successful_jobs + counters.failed_jobs < counters.total_jobs);
        assert_eq!(
            counters.successful_jobs
                + counters.failed_jobs
                + counters.running_jobs
                + counters.untriggered_jobs
                + counters.disabled_jobs,
            counters.total_jobs
        );

        let settled = vec![
            JobBuilder::new("a").succeeded_at(1).build(),
            JobBuilder::new("c").failed_at(1).build(),
        ];
        let counters = aggregate(&snapshot(settled)).counters;
        assert_eq!(counters.successful_jobs + counters.failed_jobs, counters.total_jobs);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let snapshot = snapshot(vec![
            JobBuilder::new("a").succeeded_at(1).build(),
            JobBuilder::new("b").failed_at(2).build(),
        ]);
        assert_eq!(aggregate(&snapshot), aggregate(&snapshot));
    }

    #[test]
    fn test_delta_between_polls() {
        let before = FleetCounters {
            total_jobs: 3,
            error_count: 4,
            failed_jobs: 1,
            ..Default::default()
        };
        let after = FleetCounters {
            total_jobs: 2,
            error_count: 6,
            failed_jobs: 2,
            ..Default::default()
        };

        let delta = after.delta(&before);
        assert_eq!(delta.total_jobs, -1);
        assert_eq!(delta.error_count, 2);
        assert_eq!(delta.failed_jobs, 1);
        assert!(!delta.is_zero());
        assert!(after.delta(&after).is_zero());
    }

    #[test]
    fn test_filter_by_status_keeps_order() {
        let jobs = vec![
            JobBuilder::new("x").failed_at(1).build(),
            JobBuilder::new("y").succeeded_at(1).build(),
            JobBuilder::new("z").failed_at(1).build(),
        ];
        let snapshot = snapshot(jobs.clone());
        let result = aggregate(&snapshot);

        let failed: Vec<&str> = filter_by_status(&jobs, &result, JobStatus::Failed)
            .into_iter()
            .map(|job| job.name.as_str())
            .collect();
        assert_eq!(failed, vec!["x", "z"]);
    }
}
