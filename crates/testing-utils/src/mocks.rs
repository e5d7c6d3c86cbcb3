//! In-memory doubles for the console ports
//!
//! `MockSchedulerApi` behaves like a small scheduler: run/toggle/delete/upsert
//! mutate its job table, and every call is logged under an operation key such
//! as `"list_jobs"` or `"toggle_job:a"`. Failures and gates are scripted per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use console_domain::{
    Execution, Job, JobPage, JobQuery, Member, NotificationKind, Notifier, SchedulerApi,
    Synchronizer, TotalCount,
};
use console_errors::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone)]
enum Failure {
    Once(ConsoleError),
    Always(ConsoleError),
}

/// 挂起某个操作，直到测试显式放行
#[derive(Debug, Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// 等待被挂起的调用真正进入
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[derive(Debug, Default)]
struct MockState {
    jobs: Vec<Job>,
    busy: Vec<Execution>,
    members: Vec<Member>,
    leader: Option<Member>,
    executions: HashMap<String, Vec<Execution>>,
    failures: HashMap<String, Failure>,
    gates: HashMap<String, Gate>,
    calls: Vec<String>,
}

/// Mock implementation of SchedulerApi for testing
#[derive(Debug, Clone, Default)]
pub struct MockSchedulerApi {
    state: Arc<Mutex<MockState>>,
}

impl MockSchedulerApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let mock = Self::new();
        mock.set_jobs(jobs);
        mock
    }

    pub fn set_jobs(&self, jobs: Vec<Job>) {
        self.state.lock().unwrap().jobs = jobs;
    }

    pub fn set_busy(&self, busy: Vec<Execution>) {
        self.state.lock().unwrap().busy = busy;
    }

    pub fn set_members(&self, members: Vec<Member>) {
        self.state.lock().unwrap().members = members;
    }

    pub fn set_leader(&self, leader: Option<Member>) {
        self.state.lock().unwrap().leader = leader;
    }

    pub fn set_executions(&self, job_name: &str, executions: Vec<Execution>) {
        self.state
            .lock()
            .unwrap()
            .executions
            .insert(job_name.to_string(), executions);
    }

    pub fn job(&self, name: &str) -> Option<Job> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|job| job.name == name)
            .cloned()
    }

    /// 下一次 `op` 调用返回 `error`，之后恢复正常
    pub fn fail_next(&self, op: &str, error: ConsoleError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op.to_string(), Failure::Once(error));
    }

    pub fn fail_always(&self, op: &str, error: ConsoleError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op.to_string(), Failure::Always(error));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// 之后的每次 `op` 调用都会停在返回前，直到 `Gate::open`
    pub fn hold(&self, op: &str) -> Gate {
        let gate = Gate::default();
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(op.to_string(), gate.clone());
        gate
    }

    pub fn release_all(&self) {
        let gates: Vec<Gate> = self.state.lock().unwrap().gates.drain().map(|(_, g)| g).collect();
        for gate in gates {
            gate.open();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.as_str() == op)
            .count()
    }

    /// 名字以 `prefix` 开头的调用次数，例如 `"run_job:"`
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// 记录调用，按需停在闸门上，并取出预设的失败
    async fn enter(&self, op: String) -> ConsoleResult<()> {
        let (gate, failure) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(op.clone());
            let gate = state.gates.get(&op).cloned();
            let failure = match state.failures.get(&op).cloned() {
                Some(Failure::Once(error)) => {
                    state.failures.remove(&op);
                    Some(error)
                }
                Some(Failure::Always(error)) => Some(error),
                None => None,
            };
            (gate, failure)
        };

        if let Some(gate) = gate {
            gate.pass().await;
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(name: &str) -> ConsoleError {
        ConsoleError::server_error(404, format!("job not found: {name}"))
    }
}

#[async_trait]
impl SchedulerApi for MockSchedulerApi {
    async fn list_jobs(&self, query: &JobQuery) -> ConsoleResult<JobPage> {
        self.enter("list_jobs".to_string()).await?;
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<Job> = state.jobs.clone();

        if let Some(q) = &query.q {
            jobs.retain(|job| job.name.contains(q.as_str()) || job.displayname.contains(q.as_str()));
        }
        if let Some(disabled) = query.disabled {
            jobs.retain(|job| job.disabled == disabled);
        }

        let total = jobs.len() as u64;
        Ok(JobPage {
            jobs,
            total: Some(TotalCount {
                start: None,
                end: None,
                total,
            }),
        })
    }

    async fn get_job(&self, name: &str) -> ConsoleResult<Job> {
        self.enter(format!("get_job:{name}")).await?;
        self.job(name).ok_or_else(|| Self::not_found(name))
    }

    async fn upsert_job(&self, body: &Value) -> ConsoleResult<()> {
        let job: Job = serde_json::from_value(body.clone())?;
        self.enter(format!("upsert_job:{}", job.name)).await?;
        let mut state = self.state.lock().unwrap();
        match state.jobs.iter_mut().find(|existing| existing.name == job.name) {
            Some(existing) => *existing = job,
            None => state.jobs.push(job),
        }
        Ok(())
    }

    async fn run_job(&self, name: &str) -> ConsoleResult<()> {
        self.enter(format!("run_job:{name}")).await?;
        self.job(name).map(|_| ()).ok_or_else(|| Self::not_found(name))
    }

    async fn toggle_job(&self, name: &str) -> ConsoleResult<()> {
        self.enter(format!("toggle_job:{name}")).await?;
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.name == name)
            .ok_or_else(|| Self::not_found(name))?;
        job.disabled = !job.disabled;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> ConsoleResult<()> {
        self.enter(format!("delete_job:{name}")).await?;
        let mut state = self.state.lock().unwrap();
        let before = state.jobs.len();
        state.jobs.retain(|job| job.name != name);
        if state.jobs.len() == before {
            return Err(Self::not_found(name));
        }
        Ok(())
    }

    async fn list_executions(
        &self,
        job_name: &str,
        output_size_limit: Option<usize>,
    ) -> ConsoleResult<Vec<Execution>> {
        self.enter(format!("list_executions:{job_name}")).await?;
        let state = self.state.lock().unwrap();
        let mut executions = state.executions.get(job_name).cloned().unwrap_or_default();
        if let Some(limit) = output_size_limit {
            for execution in &mut executions {
                if execution.output.len() > limit {
                    let mut cut = limit;
                    while !execution.output.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    execution.output.truncate(cut);
                    execution.output_truncated = true;
                }
            }
        }
        Ok(executions)
    }

    async fn get_execution(&self, job_name: &str, execution_id: &str) -> ConsoleResult<Execution> {
        self.enter(format!("get_execution:{job_name}/{execution_id}"))
            .await?;
        let state = self.state.lock().unwrap();
        state
            .executions
            .get(job_name)
            .and_then(|executions| executions.iter().find(|e| e.id == execution_id))
            .cloned()
            .ok_or_else(|| ConsoleError::server_error(404, "execution not found"))
    }

    async fn busy(&self) -> ConsoleResult<Vec<Execution>> {
        self.enter("busy".to_string()).await?;
        Ok(self.state.lock().unwrap().busy.clone())
    }

    async fn members(&self) -> ConsoleResult<Vec<Member>> {
        self.enter("members".to_string()).await?;
        Ok(self.state.lock().unwrap().members.clone())
    }

    async fn leader(&self) -> ConsoleResult<Member> {
        self.enter("leader".to_string()).await?;
        self.state
            .lock()
            .unwrap()
            .leader
            .clone()
            .ok_or_else(|| ConsoleError::server_error(500, "no leader"))
    }
}

/// 记录所有通知的Notifier
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(String, NotificationKind)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, NotificationKind)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), kind));
    }
}

/// 只计数的Synchronizer
#[derive(Debug, Clone, Default)]
pub struct RecordingSynchronizer {
    requests: Arc<Mutex<usize>>,
}

impl RecordingSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl Synchronizer for RecordingSynchronizer {
    async fn request_sync(&self) {
        *self.requests.lock().unwrap() += 1;
    }
}
