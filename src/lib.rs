pub mod app;
pub mod cli;
pub mod render;
pub mod shutdown;

pub use app::{config_command, Application};
pub use cli::{CliApp, Commands};
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
