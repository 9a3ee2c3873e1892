use anyhow::Context;
use clap::Parser;
use endo_runner::config::{CliConfig, Command};
use endo_runner::core::invocation::build_invocation;
use endo_runner::domain::model::{JobDefinition, JobKind, RunReport};
use endo_runner::domain::ports::Launcher;
use endo_runner::utils::error::RunnerError;
use endo_runner::utils::{logger, validation::Validate};
use endo_runner::{
    DryRunLauncher, JobRunner, LocalWorkspace, PartialRun, ProcessLauncher, RunnerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.log_json);

    tracing::info!("🚀 Starting endo-runner");
    tracing::debug!("CLI config: {:?}", args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| format!("run_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

    let jobs: Vec<JobDefinition> = match &args.command {
        Command::List => {
            display_jobs(&config);
            return Ok(());
        }
        Command::Run { names } => {
            let selected = names
                .iter()
                .map(|n| config.job(n).cloned())
                .collect::<endo_runner::Result<Vec<_>>>();
            match selected {
                Ok(jobs) => jobs,
                Err(e) => fail(e),
            }
        }
        Command::RunAll { only, skip } => match config.selected_jobs(only, skip) {
            Ok(jobs) => jobs.into_iter().cloned().collect(),
            Err(e) => fail(e),
        },
        Command::Folders(folder_args) => {
            let job = folder_args.to_job();
            if let Err(e) = endo_runner::config::toml_config::validate_job(&job) {
                fail(e);
            }
            vec![job]
        }
    };

    if jobs.is_empty() {
        tracing::warn!("⚠️ No jobs selected, nothing to do");
        return Ok(());
    }

    let monitor_enabled = args.monitor || config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No processes will be started");
        execute(DryRunLauncher, config, &args, monitor_enabled, &execution_id, &jobs).await
    } else {
        let mut launcher = ProcessLauncher::new();
        if let Some(ref dir) = config.runner.working_dir {
            launcher = launcher.with_cwd(dir);
        }
        execute(launcher, config, &args, monitor_enabled, &execution_id, &jobs).await
    };

    let report = match result {
        Ok(report) => report,
        Err(PartialRun { report, error }) => {
            // 已完成的任務仍寫入報告
            write_report(&args, &report)?;
            display_summary(&report);
            fail(error)
        }
    };

    write_report(&args, &report)?;
    display_summary(&report);

    // 與 shell 腳本相同：以最後一個執行的指令的退出碼結束
    let exit_code = report.exit_code();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn write_report(args: &CliConfig, report: &RunReport) -> anyhow::Result<()> {
    if let Some(ref path) = args.report {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        tracing::info!("📁 Run report saved to: {}", path.display());
    }
    Ok(())
}

fn load_config(args: &CliConfig) -> endo_runner::Result<RunnerConfig> {
    // folders 子命令可以不需要設定檔
    let config = if matches!(args.command, Command::Folders(_)) && !args.config.exists() {
        RunnerConfig::default()
    } else {
        tracing::info!("📁 Loading configuration from: {}", args.config.display());
        RunnerConfig::from_file(&args.config)?
    };

    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");
    Ok(config)
}

async fn execute<L: Launcher>(
    launcher: L,
    config: RunnerConfig,
    args: &CliConfig,
    monitor_enabled: bool,
    execution_id: &str,
    jobs: &[JobDefinition],
) -> Result<RunReport, PartialRun> {
    let runner = JobRunner::new_with_monitoring(launcher, LocalWorkspace::new(), config, monitor_enabled)
        .with_dry_run(args.dry_run);
    runner.run_jobs(execution_id, jobs).await
}

fn fail(e: RunnerError) -> ! {
    tracing::error!(
        "❌ endo-runner failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

fn display_jobs(config: &RunnerConfig) {
    println!("📋 Configured jobs:");
    if config.jobs.is_empty() {
        println!("  (none)");
    }

    for job in &config.jobs {
        let state = if job.is_enabled() { "" } else { " [disabled]" };
        println!("  {} ({}){}", job.name, job.kind.label(), state);
        if let Some(ref description) = job.description {
            println!("    {}", description);
        }
        match &job.kind {
            JobKind::Folders(batch) => println!(
                "    {}/<top>/<sub> -> <sub>{} (sampling {}, {})",
                batch.parent_dir.display(),
                batch.output_suffix,
                batch.sampling,
                batch.annotator.file_name()
            ),
            _ => {
                if let Some(invocation) = build_invocation(config, job) {
                    println!("    $ {}", invocation);
                }
            }
        }
    }
}

fn display_summary(report: &RunReport) {
    println!();
    println!("📋 Run Summary ({}):", report.execution_id);
    for job in &report.jobs {
        let status = if job.succeeded() { "✅" } else { "❌" };
        if job.folders.is_empty() {
            println!("  {} {} (exit {})", status, job.name, job.exit_code);
        } else {
            println!(
                "  {} {} (exit {}): {} processed, {} skipped",
                status,
                job.name,
                job.exit_code,
                job.processed_count(),
                job.skipped_count()
            );
        }
    }
}
