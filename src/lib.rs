pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::adapters::{DryRunLauncher, LocalWorkspace, ProcessLauncher};
pub use crate::config::toml_config::RunnerConfig;
pub use crate::core::{folders::FolderBatchRunner, runner::{JobRunner, PartialRun}};
pub use crate::utils::error::{Result, RunnerError};
