use crate::domain::model::{AnnotatorScript, FolderBatch, JobDefinition, JobKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "endo-runner")]
#[command(about = "Runs the endoscopic image annotation scripts with fixed, configured arguments")]
pub struct CliConfig {
    /// Path to TOML job configuration file
    #[arg(short, long, global = true, default_value = "endo-runner.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print the commands that would run without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log process stats after each job (overrides [monitoring].enabled)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Write a JSON run report to this path
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Execution ID recorded in the report
    #[arg(long, global = true)]
    pub execution_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List configured jobs and the command each would run
    List,

    /// Run the named jobs in the given order
    Run {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Run every enabled job in file order
    RunAll {
        /// Run only these jobs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Skip these jobs (comma-separated)
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
    },

    /// Annotate every <parent>/<top>/<sub> folder whose output is still empty
    Folders(FolderArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FolderArgs {
    /// Parent directory holding the top-level folders
    #[arg(long)]
    pub parent: PathBuf,

    /// Suffix appended to each subfolder name to form its output directory
    #[arg(long, default_value = "_annotated")]
    pub suffix: String,

    /// Frames sampled per folder by the annotator
    #[arg(long)]
    pub sampling: u32,

    /// Place outputs under <output-root>/<top>/ instead of next to each subfolder
    #[arg(long)]
    pub output_root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnnotatorScript::ImageAnnotator)]
    pub annotator: AnnotatorScript,

    /// Stop at the first annotator failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Interpreter override
    #[arg(long)]
    pub python: Option<String>,
}

impl FolderArgs {
    pub fn to_job(&self) -> JobDefinition {
        let mut job = JobDefinition::new(
            "folders",
            JobKind::Folders(FolderBatch {
                parent_dir: self.parent.clone(),
                output_suffix: self.suffix.clone(),
                output_root: self.output_root.clone(),
                sampling: self.sampling,
                annotator: self.annotator,
                fail_fast: self.fail_fast,
            }),
        );
        job.interpreter = self.python.clone();
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_folders_subcommand() {
        let cli = CliConfig::try_parse_from([
            "endo-runner",
            "--dry-run",
            "folders",
            "--parent",
            "/data/frames",
            "--sampling",
            "5",
            "--annotator",
            "gpt_api",
        ])
        .unwrap();

        assert!(cli.dry_run);
        let Command::Folders(args) = cli.command else {
            panic!("expected folders subcommand");
        };
        let job = args.to_job();
        match job.kind {
            JobKind::Folders(batch) => {
                assert_eq!(batch.output_suffix, "_annotated");
                assert_eq!(batch.sampling, 5);
                assert_eq!(batch.annotator, AnnotatorScript::GptApi);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_all_filters() {
        let cli = CliConfig::try_parse_from([
            "endo-runner",
            "run-all",
            "--only",
            "nose,concat",
            "--skip",
            "improve",
        ])
        .unwrap();

        match cli.command {
            Command::RunAll { only, skip } => {
                assert_eq!(only, vec!["nose", "concat"]);
                assert_eq!(skip, vec!["improve"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_a_name() {
        assert!(CliConfig::try_parse_from(["endo-runner", "run"]).is_err());
    }
}
