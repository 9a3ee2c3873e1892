pub mod folders;
pub mod invocation;
pub mod runner;

pub use crate::domain::model::{FolderOutcome, Invocation, JobDefinition, JobKind, JobReport, RunReport};
pub use crate::domain::ports::{Launcher, RunnerSettings, Workspace};
pub use crate::utils::error::Result;
