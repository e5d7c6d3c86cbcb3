//! 控制台核心：快照 → 聚合/分页 → 视图，以及命令分发与通知

pub mod aggregator;
pub mod command_dispatcher;
pub mod notification;
pub mod pagination;
pub mod polling_loop;
pub mod view;

pub use aggregator::{aggregate, derive_status, filter_by_status, Aggregate, FleetCounters, FleetDelta};
pub use command_dispatcher::{BulkReport, Command, CommandDispatcher};
pub use notification::{Notification, NotificationCenter, NotificationEvent};
pub use pagination::{group, page, PageInfo, PageNav, Paginator};
pub use polling_loop::{PollPhase, PollingLoop, TickOutcome};
pub use view::ConsoleView;
