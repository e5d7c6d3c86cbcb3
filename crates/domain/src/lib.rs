pub mod entities;
pub mod job_draft;
pub mod ports;
pub mod value_objects;
pub mod wire;

pub use console_errors::{ConsoleError, ConsoleResult};
pub use entities::*;
pub use job_draft::JobDraft;
pub use ports::*;
pub use value_objects::*;
