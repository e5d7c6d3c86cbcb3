use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use console_client::CredentialStore;
use console_domain::{
    ConsoleError, ConsoleResult, Job, JobDraft, NotificationKind, Notifier, SchedulerApi,
    Synchronizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Toggle,
    Delete,
    Save,
}

impl Command {
    fn success_message(&self) -> &'static str {
        match self {
            Command::Run => "Success running job",
            Command::Toggle => "Job toggled",
            Command::Delete => "Job deleted",
            Command::Save => "Job saved",
        }
    }

    fn error_message(&self) -> &'static str {
        match self {
            Command::Run => "Error on running job",
            Command::Toggle => "Error on job toggle",
            Command::Delete => "Error on job delete",
            Command::Save => "Error on job save",
        }
    }
}

/// 批量操作的逐项结果
#[derive(Debug, Default)]
pub struct BulkReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, ConsoleError)>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

type InFlightSet = Arc<Mutex<HashSet<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 离开作用域时清除任务的进行中标记，成功失败都一样
struct InFlightGuard {
    registry: InFlightSet,
    name: String,
}

impl InFlightGuard {
    fn acquire(registry: &InFlightSet, name: &str) -> Option<Self> {
        if !lock(registry).insert(name.to_string()) {
            return None;
        }
        Some(Self {
            registry: Arc::clone(registry),
            name: name.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.name);
    }
}

/// 把用户操作翻译成API调用
///
/// 单项命令：标记进行中 → 一次API调用 → 成功则通知并请求同步，
/// 失败则通知错误 → 无论成败清除标记。
/// 批量命令按选择顺序逐项派发，互不影响。
#[derive(Clone)]
pub struct CommandDispatcher {
    api: Arc<dyn SchedulerApi>,
    notifier: Arc<dyn Notifier>,
    synchronizer: Arc<dyn Synchronizer>,
    credentials: Arc<CredentialStore>,
    in_flight: InFlightSet,
    selection: Arc<Mutex<Vec<String>>>,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn SchedulerApi>,
        notifier: Arc<dyn Notifier>,
        synchronizer: Arc<dyn Synchronizer>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            api,
            notifier,
            synchronizer,
            credentials,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            selection: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn run(&self, name: &str) -> ConsoleResult<()> {
        self.execute(Command::Run, name, None).await
    }

    pub async fn toggle(&self, name: &str) -> ConsoleResult<()> {
        self.execute(Command::Toggle, name, None).await
    }

    pub async fn delete(&self, name: &str) -> ConsoleResult<()> {
        self.execute(Command::Delete, name, None).await
    }

    /// 校验编辑器中的原始JSON，通过后才提交
    pub async fn upsert(&self, raw: &str) -> ConsoleResult<()> {
        let draft = match JobDraft::parse(raw) {
            Ok(draft) => draft,
            Err(e) => {
                self.report_failure(Command::Save, "", &e);
                return Err(e);
            }
        };
        let name = draft.name().to_string();
        self.execute(Command::Save, &name, Some(draft.into_body()))
            .await
    }

    pub async fn run_many(&self, names: &[String]) -> BulkReport {
        self.execute_many(Command::Run, names).await
    }

    pub async fn toggle_many(&self, names: &[String]) -> BulkReport {
        self.execute_many(Command::Toggle, names).await
    }

    pub async fn delete_many(&self, names: &[String]) -> BulkReport {
        self.execute_many(Command::Delete, names).await
    }

    /// 对当前选择执行批量命令
    pub async fn execute_selected(&self, command: Command) -> BulkReport {
        let names = self.selected();
        self.execute_many(command, &names).await
    }

    async fn execute(&self, command: Command, name: &str, body: Option<Value>) -> ConsoleResult<()> {
        if name.trim().is_empty() {
            let e = ConsoleError::validation_error("任务名不能为空");
            self.report_failure(command, name, &e);
            return Err(e);
        }

        let Some(guard) = InFlightGuard::acquire(&self.in_flight, name) else {
            let e = ConsoleError::validation_error(format!("任务 {name} 已有命令在执行"));
            self.report_failure(command, name, &e);
            return Err(e);
        };

        debug!("Dispatching {:?} for job {}", command, name);
        let result = match (command, body) {
            (Command::Run, _) => self.api.run_job(name).await,
            (Command::Toggle, _) => self.api.toggle_job(name).await,
            (Command::Delete, _) => self.api.delete_job(name).await,
            (Command::Save, Some(body)) => self.api.upsert_job(&body).await,
            (Command::Save, None) => Err(ConsoleError::validation_error("缺少任务定义")),
        };
        // 进行中标记只覆盖API调用本身，不覆盖随后的同步
        drop(guard);

        match result {
            Ok(()) => {
                info!("{:?} succeeded for job {}", command, name);
                self.notifier.notify(
                    &format!("{}: {}", command.success_message(), name),
                    NotificationKind::Success,
                );
                self.synchronizer.request_sync().await;
                Ok(())
            }
            Err(e) => {
                if e.is_auth() {
                    self.credentials.clear();
                }
                self.report_failure(command, name, &e);
                Err(e)
            }
        }
    }

    fn report_failure(&self, command: Command, name: &str, e: &ConsoleError) {
        warn!("{:?} failed for job {:?}: {}", command, name, e);
        let message = if name.is_empty() {
            format!("{}: {}", command.error_message(), e)
        } else {
            format!("{} {}: {}", command.error_message(), name, e)
        };
        self.notifier.notify(&message, NotificationKind::Error);
    }

    /// 每项一个任务，按顺序派发；派发完毕即清空选择，再收集结果
    async fn execute_many(&self, command: Command, names: &[String]) -> BulkReport {
        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let this = self.clone();
            let item = name.clone();
            let handle = tokio::spawn(async move { this.execute(command, &item, None).await });
            handles.push((name.clone(), handle));
        }
        self.clear_selection();

        let mut report = BulkReport::default();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => report.succeeded.push(name),
                Ok(Err(e)) => report.failed.push((name, e)),
                Err(e) => report
                    .failed
                    .push((name, ConsoleError::Internal(format!("命令任务异常退出: {e}")))),
            }
        }

        info!(
            "Bulk {:?} finished: {} succeeded, {} failed",
            command,
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    pub fn in_flight(&self, name: &str) -> bool {
        lock(&self.in_flight).contains(name)
    }

    pub fn in_flight_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.in_flight).iter().cloned().collect();
        names.sort();
        names
    }

    pub fn select(&self, name: &str) {
        let mut selection = lock(&self.selection);
        if !selection.iter().any(|selected| selected == name) {
            selection.push(name.to_string());
        }
    }

    pub fn deselect(&self, name: &str) {
        lock(&self.selection).retain(|selected| selected != name);
    }

    /// 选中当前页上的全部任务
    pub fn select_all(&self, page: &[Job]) {
        for job in page {
            self.select(&job.name);
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        lock(&self.selection).iter().any(|selected| selected == name)
    }

    pub fn selected(&self) -> Vec<String> {
        lock(&self.selection).clone()
    }

    pub fn clear_selection(&self) {
        lock(&self.selection).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_testing_utils::{JobBuilder, MockSchedulerApi, RecordingNotifier, RecordingSynchronizer};

    fn dispatcher(
        api: &MockSchedulerApi,
    ) -> (CommandDispatcher, RecordingNotifier, RecordingSynchronizer) {
        let notifier = RecordingNotifier::new();
        let sync = RecordingSynchronizer::new();
        let dispatcher = CommandDispatcher::new(
            Arc::new(api.clone()),
            Arc::new(notifier.clone()),
            Arc::new(sync.clone()),
            Arc::new(CredentialStore::new(Some("token".to_string()))),
        );
        (dispatcher, notifier, sync)
    }

    #[test]
    fn test_in_flight_guard_clears_on_drop() {
        let registry: InFlightSet = Arc::default();
        {
            let _guard = InFlightGuard::acquire(&registry, "a").unwrap();
            assert!(InFlightGuard::acquire(&registry, "a").is_none());
        }
        assert!(lock(&registry).is_empty());
    }

    #[tokio::test]
    async fn test_selection_keeps_order_without_duplicates() {
        let api = MockSchedulerApi::new();
        let (dispatcher, _, _) = dispatcher(&api);

        dispatcher.select("b");
        dispatcher.select("a");
        dispatcher.select("b");
        dispatcher.select_all(&[JobBuilder::new("c").build(), JobBuilder::new("a").build()]);
        assert_eq!(dispatcher.selected(), vec!["b", "a", "c"]);

        dispatcher.deselect("a");
        assert!(!dispatcher.is_selected("a"));
        dispatcher.clear_selection();
        assert!(dispatcher.selected().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_rejected_without_call() {
        let api = MockSchedulerApi::new();
        let (dispatcher, notifier, sync) = dispatcher(&api);

        let err = dispatcher.run("  ").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
        assert!(api.calls().is_empty());
        assert_eq!(notifier.count(NotificationKind::Error), 1);
        assert_eq!(sync.requests(), 0);
    }

    #[tokio::test]
    async fn test_bulk_skips_duplicate_names() {
        let api = MockSchedulerApi::with_jobs(vec![JobBuilder::new("a").build()]);
        let (dispatcher, _, _) = dispatcher(&api);

        let report = dispatcher
            .run_many(&["a".to_string(), "a".to_string()])
            .await;
        assert_eq!(report.succeeded, vec!["a"]);
        assert_eq!(api.call_count("run_job:a"), 1);
    }
}
