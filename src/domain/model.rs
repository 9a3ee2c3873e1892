use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

/// 一次外部程式呼叫：直譯器、腳本與逐一傳遞的參數
///
/// Arguments are kept as `OsString` so non-UTF-8 paths reach the child unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub script: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn flag(self, name: &str, value: impl Into<OsString>) -> Self {
        self.arg(name).arg(value)
    }

    pub fn opt_flag<T: Into<OsString>>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.flag(name, v),
            None => self,
        }
    }

    /// Full argv after the program name.
    pub fn argv(&self) -> Vec<OsString> {
        std::iter::once(self.script.clone().into_os_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 只用於日誌與 dry-run，非 UTF-8 以替代字元顯示
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in self.argv() {
            write!(f, " {}", shell_quote(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatMode {
    Full,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum), value(rename_all = "snake_case"))]
pub enum AnnotatorScript {
    #[default]
    ImageAnnotator,
    GptApi,
}

impl AnnotatorScript {
    pub fn file_name(&self) -> &'static str {
        match self {
            AnnotatorScript::ImageAnnotator => "image_annotator.py",
            AnnotatorScript::GptApi => "gpt_api.py",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderBatch {
    pub parent_dir: PathBuf,
    pub output_suffix: String,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    pub sampling: u32,
    #[serde(default)]
    pub annotator: AnnotatorScript,
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    TextImprove {
        input_file: PathBuf,
        #[serde(default)]
        output_file: Option<PathBuf>,
        #[serde(default)]
        chunk_size: Option<u32>,
    },
    Nose {
        input: PathBuf,
        output_dir: PathBuf,
        prompt: String,
        #[serde(default)]
        sampling: Option<u32>,
    },
    GptApi {
        input: PathBuf,
        output_dir: PathBuf,
        sampling: u32,
    },
    ImageAnnotator {
        input: PathBuf,
        output_dir: PathBuf,
        sampling: u32,
    },
    Concat {
        mode: ConcatMode,
        dir: PathBuf,
    },
    VideoFrames {
        input: PathBuf,
        output: PathBuf,
        #[serde(default)]
        max_frames: Option<u32>,
        #[serde(default)]
        rotate: Option<u32>,
        #[serde(default)]
        target_fps: Option<f64>,
        #[serde(default)]
        exifmodel: Option<PathBuf>,
        #[serde(default)]
        verbose: bool,
    },
    Folders(FolderBatch),
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::TextImprove { .. } => "text_improve",
            JobKind::Nose { .. } => "nose",
            JobKind::GptApi { .. } => "gpt_api",
            JobKind::ImageAnnotator { .. } => "image_annotator",
            JobKind::Concat { .. } => "concat",
            JobKind::VideoFrames { .. } => "video_frames",
            JobKind::Folders(_) => "folders",
        }
    }

    /// 執行前必須存在的輸入路徑
    pub fn input_path(&self) -> &PathBuf {
        match self {
            JobKind::TextImprove { input_file, .. } => input_file,
            JobKind::Nose { input, .. }
            | JobKind::GptApi { input, .. }
            | JobKind::ImageAnnotator { input, .. }
            | JobKind::VideoFrames { input, .. } => input,
            JobKind::Concat { dir, .. } => dir,
            JobKind::Folders(batch) => &batch.parent_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, kind: JobKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: None,
            interpreter: None,
            kind,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FolderOutcome {
    Processed {
        input: PathBuf,
        output_dir: PathBuf,
        exit_code: i32,
    },
    Skipped {
        input: PathBuf,
        output_dir: PathBuf,
    },
}

impl FolderOutcome {
    pub fn input(&self) -> &PathBuf {
        match self {
            FolderOutcome::Processed { input, .. } | FolderOutcome::Skipped { input, .. } => input,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FolderOutcome::Skipped { .. })
    }

    /// 跳過等同於 shell 裡成功執行的 echo
    pub fn exit_code(&self) -> i32 {
        match self {
            FolderOutcome::Processed { exit_code, .. } => *exit_code,
            FolderOutcome::Skipped { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub name: String,
    pub kind: String,
    pub invocations: Vec<String>,
    pub folders: Vec<FolderOutcome>,
    pub exit_code: i32,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn skipped_count(&self) -> usize {
        self.folders.iter().filter(|f| f.is_skipped()).count()
    }

    pub fn processed_count(&self) -> usize {
        self.folders.len() - self.skipped_count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: String,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            jobs: Vec::new(),
        }
    }

    /// 最後一個執行的指令的退出碼，沒有任何任務時為 0
    pub fn exit_code(&self) -> i32 {
        self.jobs.last().map(|j| j.exit_code).unwrap_or(0)
    }
}
