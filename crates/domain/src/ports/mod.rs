pub mod api;
pub mod notifier;

pub use api::SchedulerApi;
pub use notifier::{Notifier, NotificationKind, Synchronizer};
