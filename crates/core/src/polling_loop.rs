use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use console_client::CredentialStore;
use console_domain::{
    ConsoleError, ConsoleResult, JobQuery, NotificationKind, Notifier, SchedulerApi, Snapshot,
    Synchronizer,
};

use crate::aggregator::{aggregate, Aggregate, FleetCounters};
use crate::pagination::{PageNav, Paginator};
use crate::view::ConsoleView;

const OUTCOME_BUFFER: usize = 16;

/// 轮询状态机：Idle → Fetching → (Idle | Failed)
///
/// `Failed` 也是稳定状态，下一次tick可以直接从它开始。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 新快照已生效
    Applied,
    /// 上一次tick尚未结束，本次未发请求
    Skipped,
    /// 请求失败，保留旧快照
    Failed,
    /// 结果返回时代数已变化，被丢弃
    Discarded,
    /// 需要重新登录，未发请求或刚刚遇到401/403
    AuthRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickSource {
    Timer,
    Sync,
}

struct LoopState {
    snapshot: Arc<Snapshot>,
    aggregate: Aggregate,
    previous_counters: Option<FleetCounters>,
    paginator: Paginator,
    phase: PollPhase,
    generation: u64,
    auth_required: bool,
    sync_pending: bool,
    last_error: Option<String>,
    applied_ticks: u64,
}

/// 轮询循环，唯一持有"当前快照"
///
/// 定时器每个周期派生一次tick；上一轮还在进行时新tick直接跳过。
/// `start`/`stop` 都会递增代数，旧代数的结果在返回时被丢弃。
/// 失败不退避，下一周期照常重试。
pub struct PollingLoop {
    api: Arc<dyn SchedulerApi>,
    notifier: Arc<dyn Notifier>,
    credentials: Arc<CredentialStore>,
    state: RwLock<LoopState>,
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
    outcomes: broadcast::Sender<TickOutcome>,
}

impl PollingLoop {
    pub fn new(
        api: Arc<dyn SchedulerApi>,
        notifier: Arc<dyn Notifier>,
        credentials: Arc<CredentialStore>,
        page_size: NonZeroUsize,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_BUFFER);
        Self {
            api,
            notifier,
            credentials,
            state: RwLock::new(LoopState {
                snapshot: Arc::new(Snapshot::empty()),
                aggregate: Aggregate::default(),
                previous_counters: None,
                paginator: Paginator::new(page_size),
                phase: PollPhase::Idle,
                generation: 0,
                auth_required: false,
                sync_pending: false,
                last_error: None,
                applied_ticks: 0,
            }),
            shutdown_tx: RwLock::new(None),
            outcomes,
        }
    }

    /// 启动定时器，第一次tick立即触发
    pub async fn start(self: &Arc<Self>, period: Duration) -> ConsoleResult<()> {
        if period.is_zero() {
            return Err(ConsoleError::validation_error("轮询间隔必须大于0"));
        }

        let mut shutdown_tx = self.shutdown_tx.write().await;
        if shutdown_tx.is_some() {
            return Err(ConsoleError::Internal("polling loop already running".to_string()));
        }

        let generation = self.bump_generation().await;
        let (tx, rx) = broadcast::channel(1);
        *shutdown_tx = Some(tx);

        info!("Starting polling loop every {:?} (generation {})", period, generation);
        tokio::spawn(Self::run_timer(Arc::clone(self), period, rx));
        Ok(())
    }

    async fn run_timer(this: Arc<Self>, period: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let this = Arc::clone(&this);
                    tokio::spawn(async move {
                        this.run_tick(TickSource::Timer).await;
                    });
                }
                _ = shutdown_rx.recv() => {
                    info!("Polling loop shutting down");
                    break;
                }
            }
        }
    }

    /// 停止定时器，正在进行的tick结果将被丢弃
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            // 停止前登记的同步请求一并作废
            state.sync_pending = false;
            state.generation
        };
        debug!("Polling loop stopped at generation {}", generation);
    }

    pub async fn is_running(&self) -> bool {
        self.shutdown_tx.read().await.is_some()
    }

    /// 执行一次tick，按跳过策略处理重叠
    pub async fn tick(&self) -> TickOutcome {
        self.run_tick(TickSource::Timer).await
    }

    /// 带外同步：若已有tick在进行，则在它结束后再补一次
    pub async fn sync_now(&self) -> TickOutcome {
        self.run_tick(TickSource::Sync).await
    }

    async fn run_tick(&self, source: TickSource) -> TickOutcome {
        let mut outcome = self.tick_once(source).await;
        // 补跑在tick期间登记的同步请求
        while !matches!(outcome, TickOutcome::Skipped | TickOutcome::Discarded)
            && self.take_pending_sync().await
        {
            debug!("Running follow-up sync tick");
            outcome = self.tick_once(TickSource::Sync).await;
        }
        outcome
    }

    async fn take_pending_sync(&self) -> bool {
        let mut state = self.state.write().await;
        std::mem::take(&mut state.sync_pending)
    }

    async fn tick_once(&self, source: TickSource) -> TickOutcome {
        let generation = {
            let mut state = self.state.write().await;
            if state.auth_required {
                debug!("Tick suppressed until credentials are provided");
                return self.publish(TickOutcome::AuthRequired);
            }
            if state.phase == PollPhase::Fetching {
                if source == TickSource::Sync {
                    state.sync_pending = true;
                }
                debug!("Previous tick still in flight, skipping");
                return self.publish(TickOutcome::Skipped);
            }
            state.phase = PollPhase::Fetching;
            state.generation
        };

        let result = self.fetch_snapshot().await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            state.phase = PollPhase::Idle;
            debug!(
                "Discarding tick result from generation {} (current {})",
                generation, state.generation
            );
            return self.publish(TickOutcome::Discarded);
        }

        match result {
            Ok(snapshot) => {
                Self::apply(&mut state, snapshot);
                debug!(
                    "Applied snapshot with {} jobs (tick {})",
                    state.snapshot.len(),
                    state.applied_ticks
                );
                self.publish(TickOutcome::Applied)
            }
            Err(e) if e.is_auth() => {
                state.phase = PollPhase::Failed;
                state.auth_required = true;
                state.last_error = Some(e.to_string());
                drop(state);

                self.credentials.clear();
                warn!("Polling rejected by scheduler: {}", e);
                self.notifier
                    .notify(e.user_message(), NotificationKind::Error);
                self.publish(TickOutcome::AuthRequired)
            }
            Err(e) => {
                state.phase = PollPhase::Failed;
                state.last_error = Some(e.to_string());
                drop(state);

                error!("Polling failed, keeping previous snapshot: {}", e);
                self.notifier.notify(
                    &format!("{}: {}", e.user_message(), e),
                    NotificationKind::Error,
                );
                self.publish(TickOutcome::Failed)
            }
        }
    }

    /// 并发拉取任务、运行中执行与成员；leader 尽力而为
    async fn fetch_snapshot(&self) -> ConsoleResult<Snapshot> {
        let query = JobQuery::new();
        let (core, leader) = futures::join!(
            async {
                futures::try_join!(
                    self.api.list_jobs(&query),
                    self.api.busy(),
                    self.api.members()
                )
            },
            self.api.leader()
        );

        let (page, busy, members) = core?;
        let leader = match leader {
            Ok(leader) => Some(leader),
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                warn!("Failed to fetch leader: {}", e);
                None
            }
        };

        Snapshot::new(page.jobs, busy, members, leader)
    }

    /// 在同一把写锁内替换快照与所有派生状态
    fn apply(state: &mut LoopState, snapshot: Snapshot) {
        let aggregate = aggregate(&snapshot);
        if state.applied_ticks > 0 {
            state.previous_counters = Some(state.aggregate.counters);
        }
        state.paginator.replace_jobs(snapshot.jobs());
        state.snapshot = Arc::new(snapshot);
        state.aggregate = aggregate;
        state.phase = PollPhase::Idle;
        state.last_error = None;
        state.applied_ticks += 1;
    }

    fn publish(&self, outcome: TickOutcome) -> TickOutcome {
        let _ = self.outcomes.send(outcome);
        outcome
    }

    async fn bump_generation(&self) -> u64 {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.generation
    }

    pub async fn view(&self) -> ConsoleView {
        let state = self.state.read().await;
        ConsoleView {
            snapshot: Arc::clone(&state.snapshot),
            aggregate: state.aggregate.clone(),
            delta: state
                .previous_counters
                .map(|previous| state.aggregate.counters.delta(&previous)),
            page: state.paginator.current().to_vec(),
            page_info: state.paginator.info(),
            phase: state.phase,
            generation: state.generation,
            auth_required: state.auth_required,
            last_error: state.last_error.clone(),
            applied_ticks: state.applied_ticks,
        }
    }

    pub async fn navigate(&self, nav: PageNav) -> bool {
        self.state.write().await.paginator.apply(nav)
    }

    pub async fn phase(&self) -> PollPhase {
        self.state.read().await.phase
    }

    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// 保存新令牌并恢复轮询
    pub async fn login(&self, token: &str) {
        self.credentials.set(token);
        let mut state = self.state.write().await;
        state.auth_required = false;
        if state.phase == PollPhase::Failed {
            state.phase = PollPhase::Idle;
        }
        info!("Credentials updated, polling resumed");
    }

    /// 每次tick结束后的结果，供渲染端驱动刷新
    pub fn subscribe(&self) -> broadcast::Receiver<TickOutcome> {
        self.outcomes.subscribe()
    }
}

#[async_trait]
impl Synchronizer for PollingLoop {
    async fn request_sync(&self) {
        self.sync_now().await;
    }
}
