use crate::core::folders::FolderBatchRunner;
use crate::core::invocation::{build_invocation, interpreter_for};
use crate::domain::model::{JobDefinition, JobKind, JobReport, RunReport};
use crate::domain::ports::{Launcher, RunnerSettings, Workspace};
use crate::utils::error::{Result, RunnerError};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use thiserror::Error;

/// 中途出錯時，已完成任務的報告仍保留下來
#[derive(Error, Debug)]
#[error("{error}")]
pub struct PartialRun {
    pub report: RunReport,
    #[source]
    pub error: RunnerError,
}

/// 依序執行任務，一次只有一個子行程
pub struct JobRunner<L: Launcher, W: Workspace, S: RunnerSettings> {
    launcher: L,
    workspace: W,
    settings: S,
    monitor: SystemMonitor,
    dry_run: bool,
}

impl<L: Launcher, W: Workspace, S: RunnerSettings> JobRunner<L, W, S> {
    pub fn new(launcher: L, workspace: W, settings: S) -> Self {
        Self {
            launcher,
            workspace,
            settings,
            monitor: SystemMonitor::new(false),
            dry_run: false,
        }
    }

    pub fn new_with_monitoring(launcher: L, workspace: W, settings: S, monitor_enabled: bool) -> Self {
        Self {
            monitor: SystemMonitor::new(monitor_enabled),
            ..Self::new(launcher, workspace, settings)
        }
    }

    /// Dry run: no directories are created. Pair with a launcher that does not spawn.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub async fn run_job(&self, job: &JobDefinition) -> Result<JobReport> {
        let started_at = Utc::now();
        tracing::info!("🚀 Running job '{}' ({})", job.name, job.kind.label());

        let input = job.kind.input_path();
        if !self.workspace.exists(input).await {
            return Err(RunnerError::InputNotFoundError {
                path: input.clone(),
            });
        }

        let mut folders = Vec::new();
        let (invocations, exit_code) = match &job.kind {
            JobKind::Folders(batch) => {
                let program = interpreter_for(&self.settings, job);
                let result = FolderBatchRunner::new(
                    &self.launcher,
                    &self.workspace,
                    program,
                    self.settings.scripts_dir(),
                )
                .with_dry_run(self.dry_run)
                .run(batch)
                .await?;

                let exit_code = result.last_exit_code();
                folders = result.outcomes;
                (result.invocations, exit_code)
            }
            _ => match build_invocation(&self.settings, job) {
                Some(invocation) => {
                    tracing::debug!("Command: {}", invocation);
                    let exit_code = self.launcher.launch(&invocation).await?;
                    (vec![invocation], exit_code)
                }
                None => (Vec::new(), 0),
            },
        };

        if exit_code == 0 {
            tracing::info!("✅ Job '{}' finished", job.name);
        } else {
            tracing::warn!("⚠️ Job '{}' finished with exit code {}", job.name, exit_code);
        }
        self.monitor.log_stats(&job.name);

        Ok(JobReport {
            name: job.name.clone(),
            kind: job.kind.label().to_string(),
            invocations: invocations.iter().map(|i| i.to_string()).collect(),
            folders,
            exit_code,
            dry_run: self.dry_run,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// 依序執行；子行程失敗不會中斷後續任務，與 shell 腳本一致
    /// 執行器本身的錯誤 (例如輸入不存在) 會停止後續任務，並連同已完成的報告一起回傳
    pub async fn run_jobs<'j, I>(
        &self,
        execution_id: &str,
        jobs: I,
    ) -> std::result::Result<RunReport, PartialRun>
    where
        I: IntoIterator<Item = &'j JobDefinition>,
    {
        let mut report = RunReport::new(execution_id);

        for job in jobs {
            match self.run_job(job).await {
                Ok(job_report) => report.jobs.push(job_report),
                Err(error) => {
                    tracing::error!(
                        "❌ Job '{}' aborted after {} completed job(s): {}",
                        job.name,
                        report.jobs.len(),
                        error
                    );
                    return Err(PartialRun { report, error });
                }
            }
        }

        self.monitor.log_final_stats();
        Ok(report)
    }
}
