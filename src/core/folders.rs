use crate::core::invocation::annotator_invocation;
use crate::domain::model::{FolderBatch, FolderOutcome, Invocation};
use crate::domain::ports::{Launcher, Workspace};
use crate::utils::error::Result;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// 兩層資料夾批次：parent/<top>/<sub>，已有輸出的子資料夾會被跳過
pub struct FolderBatchRunner<'a, L: Launcher, W: Workspace> {
    launcher: &'a L,
    workspace: &'a W,
    program: &'a str,
    scripts_dir: &'a Path,
    dry_run: bool,
}

/// 批次結果；`invocations` 只包含實際啟動 (或 dry-run 列出) 的指令
#[derive(Debug, Default)]
pub struct FolderBatchResult {
    pub outcomes: Vec<FolderOutcome>,
    pub invocations: Vec<Invocation>,
}

impl FolderBatchResult {
    pub fn last_exit_code(&self) -> i32 {
        self.outcomes.last().map(|o| o.exit_code()).unwrap_or(0)
    }
}

impl<'a, L: Launcher, W: Workspace> FolderBatchRunner<'a, L, W> {
    pub fn new(launcher: &'a L, workspace: &'a W, program: &'a str, scripts_dir: &'a Path) -> Self {
        Self {
            launcher,
            workspace,
            program,
            scripts_dir,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, batch: &FolderBatch) -> Result<FolderBatchResult> {
        let mut result = FolderBatchResult::default();

        for top in self.workspace.list_dirs(&batch.parent_dir).await? {
            tracing::debug!("Scanning top-level folder: {}", top.display());

            let subs = self.workspace.list_dirs(&top).await?;
            let derived: HashSet<PathBuf> =
                subs.iter().map(|x| output_dir_for(batch, &top, x)).collect();

            for sub in subs {
                // 只有當它是同層另一個資料夾的輸出時才排除
                if derived.contains(&sub) {
                    tracing::debug!("Ignoring output folder: {}", sub.display());
                    continue;
                }

                let output_dir = output_dir_for(batch, &top, &sub);
                let outcome = self.process_subfolder(batch, sub, output_dir, &mut result).await?;
                let failed = outcome.exit_code() != 0;
                result.outcomes.push(outcome);

                if failed && batch.fail_fast {
                    tracing::warn!("⏹️ Stopping folder batch after first failure (fail_fast)");
                    return Ok(result);
                }
            }
        }

        let skipped = result.outcomes.iter().filter(|o| o.is_skipped()).count();
        tracing::info!(
            "📂 Folder batch finished: {} processed, {} skipped",
            result.outcomes.len() - skipped,
            skipped
        );
        Ok(result)
    }

    async fn process_subfolder(
        &self,
        batch: &FolderBatch,
        input: PathBuf,
        output_dir: PathBuf,
        result: &mut FolderBatchResult,
    ) -> Result<FolderOutcome> {
        if self.workspace.has_entries(&output_dir).await? {
            tracing::info!(
                "⏭️ Skipping {}: output already exists in {}",
                input.display(),
                output_dir.display()
            );
            return Ok(FolderOutcome::Skipped { input, output_dir });
        }

        if self.dry_run {
            tracing::info!("🔍 [dry-run] Would create {}", output_dir.display());
        } else {
            self.workspace.ensure_dir(&output_dir).await?;
        }

        let invocation = annotator_invocation(
            self.program,
            self.scripts_dir,
            batch.annotator,
            &input,
            &output_dir,
            batch.sampling,
        );
        tracing::info!("▶️ Processing {}", input.display());
        let exit_code = self.launcher.launch(&invocation).await?;
        result.invocations.push(invocation);

        Ok(FolderOutcome::Processed {
            input,
            output_dir,
            exit_code,
        })
    }
}

/// `sub` 加上後綴；有 output_root 時放在 output_root/<top>/ 之下
pub fn output_dir_for(batch: &FolderBatch, top: &Path, sub: &Path) -> PathBuf {
    let mut name: OsString = sub.file_name().map(OsString::from).unwrap_or_default();
    name.push(&batch.output_suffix);

    match (&batch.output_root, top.file_name()) {
        (Some(root), Some(top_name)) => root.join(top_name).join(name),
        _ => sub.with_file_name(name),
    }
}
