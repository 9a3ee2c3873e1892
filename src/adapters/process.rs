use crate::domain::model::Invocation;
use crate::domain::ports::Launcher;
use crate::utils::error::{Result, RunnerError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// 以子行程執行外部 Python 腳本，標準輸入輸出直接繼承
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    cwd: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<i32> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(invocation.argv())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!("Spawning: {}", invocation);
        let status = cmd.status().await.map_err(|source| RunnerError::LaunchError {
            program: invocation.program.clone(),
            source,
        })?;

        let code = exit_code_of(status);
        if code == 0 {
            tracing::debug!("Process exited successfully");
        } else {
            tracing::warn!("⚠️ Process exited with code {}: {}", code, invocation);
        }
        Ok(code)
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// 只列出會執行的指令，不啟動任何行程
#[derive(Debug, Clone, Default)]
pub struct DryRunLauncher;

#[async_trait]
impl Launcher for DryRunLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<i32> {
        tracing::info!("🔍 [dry-run] {}", invocation);
        println!("{}", invocation);
        Ok(0)
    }
}
