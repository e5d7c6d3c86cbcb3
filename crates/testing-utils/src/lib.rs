//! # Console Testing Utils
//!
//! Shared test doubles for the console workspace.
//!
//! ## Features
//!
//! - **Mock API**: in-memory `SchedulerApi` with scripted failures and call gates
//! - **Recording ports**: notifier and synchronizer doubles that remember every call
//! - **Test Data Builders**: jobs, executions and members with sensible defaults
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! console-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust
//! use console_testing_utils::{JobBuilder, MockSchedulerApi};
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
