// Adapters layer: concrete implementations for external systems (child processes, local file system).

pub mod process;
pub mod workspace;

pub use process::{DryRunLauncher, ProcessLauncher};
pub use workspace::LocalWorkspace;
