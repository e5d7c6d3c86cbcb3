pub mod api;
pub mod app_config;
pub mod logging;
pub mod polling;

pub use api::*;
pub use app_config::*;
pub use logging::*;
pub use polling::*;
