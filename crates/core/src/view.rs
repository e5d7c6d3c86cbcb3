use std::sync::Arc;

use console_domain::{Execution, Job, JobStatus, Member, Snapshot};

use crate::aggregator::{Aggregate, FleetCounters, FleetDelta};
use crate::pagination::PageInfo;
use crate::polling_loop::PollPhase;

/// 渲染用的只读视图，每次调用 `PollingLoop::view` 都得到一份独立拷贝
#[derive(Debug, Clone)]
pub struct ConsoleView {
    pub snapshot: Arc<Snapshot>,
    pub aggregate: Aggregate,
    /// 与上一份成功快照相比的计数变化，首次轮询前为 `None`
    pub delta: Option<FleetDelta>,
    pub page: Vec<Job>,
    pub page_info: PageInfo,
    pub phase: PollPhase,
    pub generation: u64,
    pub auth_required: bool,
    pub last_error: Option<String>,
    pub applied_ticks: u64,
}

impl ConsoleView {
    pub fn counters(&self) -> &FleetCounters {
        &self.aggregate.counters
    }

    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.aggregate.status_of(name)
    }

    pub fn leader(&self) -> Option<&Member> {
        self.snapshot.leader()
    }

    pub fn leader_label(&self) -> String {
        match self.snapshot.leader() {
            Some(leader) => leader.name.clone(),
            None => "no leader".to_string(),
        }
    }

    pub fn members(&self) -> &[Member] {
        self.snapshot.members()
    }

    pub fn busy(&self) -> impl Iterator<Item = &Execution> {
        self.snapshot.running().iter().filter(|e| e.is_running())
    }

    /// 是否已经拿到过至少一份快照
    pub fn is_loaded(&self) -> bool {
        self.applied_ticks > 0
    }
}
