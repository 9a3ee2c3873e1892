use crate::domain::model::{JobDefinition, JobKind};
use crate::domain::ports::RunnerSettings;
use crate::utils::error::{Result, RunnerError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub monitoring: Option<MonitoringConfig>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSection {
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_python3")]
    pub python3: String,
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// 子行程的工作目錄，預設為目前目錄
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_python() -> String {
    "python".to_string()
}

fn default_python3() -> String {
    "python3".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            python: default_python(),
            python3: default_python3(),
            scripts_dir: default_scripts_dir(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl RunnerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RunnerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let config: Self =
            toml::from_str(&processed_content).map_err(|e| RunnerError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        // flatten 會吞掉拼錯的欄位，至少要提醒
        for key in unknown_keys(&processed_content) {
            tracing::warn!("⚠️ Ignoring unknown configuration key: {}", key);
        }

        Ok(config)
    }

    /// 替換環境變數 (例如 ${DATA_ROOT})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RunnerError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn job(&self, name: &str) -> Result<&JobDefinition> {
        self.jobs
            .iter()
            .find(|j| j.name == name)
            .ok_or_else(|| RunnerError::UnknownJobError {
                name: name.to_string(),
            })
    }

    /// 依檔案順序回傳已啟用的任務，並套用 only/skip 篩選
    pub fn selected_jobs(&self, only: &[String], skip: &[String]) -> Result<Vec<&JobDefinition>> {
        for name in only.iter().chain(skip) {
            self.job(name)?;
        }

        Ok(self
            .jobs
            .iter()
            .filter(|j| j.is_enabled())
            .filter(|j| only.is_empty() || only.contains(&j.name))
            .filter(|j| !skip.contains(&j.name))
            .collect())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("runner.python", &self.runner.python)?;
        validation::validate_non_empty_string("runner.python3", &self.runner.python3)?;
        validation::validate_path("runner.scripts_dir", &self.runner.scripts_dir)?;

        validation::validate_unique_names("jobs.name", self.jobs.iter().map(|j| j.name.as_str()))?;

        for job in &self.jobs {
            validate_job(job)?;
        }

        Ok(())
    }
}

pub fn validate_job(job: &JobDefinition) -> Result<()> {
    validation::validate_non_empty_string("jobs.name", &job.name)?;
    let field = |name: &str| format!("jobs.{}.{}", job.name, name);

    if let Some(ref interpreter) = job.interpreter {
        validation::validate_non_empty_string(&field("interpreter"), interpreter)?;
    }

    match &job.kind {
        JobKind::TextImprove {
            input_file,
            output_file,
            chunk_size,
        } => {
            validation::validate_path(&field("input_file"), input_file)?;
            if let Some(out) = output_file {
                validation::validate_path(&field("output_file"), out)?;
            }
            if let Some(size) = chunk_size {
                validation::validate_positive_number(&field("chunk_size"), *size, 1)?;
            }
        }
        JobKind::Nose {
            input,
            output_dir,
            prompt,
            sampling,
        } => {
            validation::validate_path(&field("input"), input)?;
            validation::validate_path(&field("output_dir"), output_dir)?;
            validation::validate_non_empty_string(&field("prompt"), prompt)?;
            if let Some(n) = sampling {
                validation::validate_positive_number(&field("sampling"), *n, 1)?;
            }
        }
        JobKind::GptApi {
            input,
            output_dir,
            sampling,
        }
        | JobKind::ImageAnnotator {
            input,
            output_dir,
            sampling,
        } => {
            validation::validate_path(&field("input"), input)?;
            validation::validate_path(&field("output_dir"), output_dir)?;
            validation::validate_positive_number(&field("sampling"), *sampling, 1)?;
        }
        JobKind::Concat { dir, .. } => {
            validation::validate_path(&field("dir"), dir)?;
        }
        JobKind::VideoFrames {
            input,
            output,
            max_frames,
            rotate,
            target_fps,
            exifmodel,
            ..
        } => {
            validation::validate_path(&field("input"), input)?;
            validation::validate_path(&field("output"), output)?;
            if let Some(n) = max_frames {
                validation::validate_positive_number(&field("max_frames"), *n, 1)?;
            }
            if let Some(r) = rotate {
                if ![90, 180, 270].contains(r) {
                    return Err(RunnerError::InvalidConfigValueError {
                        field: field("rotate"),
                        value: r.to_string(),
                        reason: "Rotation must be one of 90, 180, 270".to_string(),
                    });
                }
            }
            if let Some(fps) = target_fps {
                validation::validate_range(&field("target_fps"), *fps, 0.001, 1000.0)?;
            }
            if let Some(exif) = exifmodel {
                validation::validate_path(&field("exifmodel"), exif)?;
            }
        }
        JobKind::Folders(batch) => {
            validation::validate_path(&field("parent_dir"), &batch.parent_dir)?;
            validation::validate_non_empty_string(&field("output_suffix"), &batch.output_suffix)?;
            if batch.output_suffix.contains(std::path::is_separator) {
                return Err(RunnerError::InvalidConfigValueError {
                    field: field("output_suffix"),
                    value: batch.output_suffix.clone(),
                    reason: "Suffix cannot contain a path separator".to_string(),
                });
            }
            if let Some(ref root) = batch.output_root {
                validation::validate_path(&field("output_root"), root)?;
                // 等於 parent_dir 可以 (輸出會被辨識並排除)，但不能在它底下另開一層
                if root != &batch.parent_dir && root.starts_with(&batch.parent_dir) {
                    return Err(RunnerError::InvalidConfigValueError {
                        field: field("output_root"),
                        value: root.display().to_string(),
                        reason: "output_root cannot be nested inside parent_dir".to_string(),
                    });
                }
            }
            validation::validate_positive_number(&field("sampling"), batch.sampling, 1)?;
        }
    }

    Ok(())
}

const TOP_LEVEL_KEYS: &[&str] = &["runner", "monitoring", "jobs"];
const RUNNER_KEYS: &[&str] = &["python", "python3", "scripts_dir", "working_dir"];
const MONITORING_KEYS: &[&str] = &["enabled"];
const JOB_KEYS: &[&str] = &["name", "description", "enabled", "interpreter", "kind"];

fn kind_keys(kind: &str) -> &'static [&'static str] {
    match kind {
        "text_improve" => &["input_file", "output_file", "chunk_size"],
        "nose" => &["input", "output_dir", "prompt", "sampling"],
        "gpt_api" | "image_annotator" => &["input", "output_dir", "sampling"],
        "concat" => &["mode", "dir"],
        "video_frames" => &[
            "input",
            "output",
            "max_frames",
            "rotate",
            "target_fps",
            "exifmodel",
            "verbose",
        ],
        "folders" => &[
            "parent_dir",
            "output_suffix",
            "output_root",
            "sampling",
            "annotator",
            "fail_fast",
        ],
        _ => &[],
    }
}

/// 列出 serde 會默默忽略的欄位，格式為 `jobs.<name>.<key>`
pub fn unknown_keys(content: &str) -> Vec<String> {
    let Ok(table) = toml::from_str::<toml::Table>(content) else {
        return Vec::new();
    };

    let mut unknown: Vec<String> = table
        .keys()
        .filter(|k| !TOP_LEVEL_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();

    for (section, known) in [("runner", RUNNER_KEYS), ("monitoring", MONITORING_KEYS)] {
        if let Some(t) = table.get(section).and_then(|v| v.as_table()) {
            unknown.extend(
                t.keys()
                    .filter(|k| !known.contains(&k.as_str()))
                    .map(|k| format!("{}.{}", section, k)),
            );
        }
    }

    let jobs = table.get("jobs").and_then(|v| v.as_array());
    for (i, job) in jobs.into_iter().flatten().enumerate() {
        let Some(job) = job.as_table() else { continue };
        let name = job
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| i.to_string());
        let kind = kind_keys(job.get("kind").and_then(|v| v.as_str()).unwrap_or_default());

        unknown.extend(
            job.keys()
                .filter(|k| !JOB_KEYS.contains(&k.as_str()) && !kind.contains(&k.as_str()))
                .map(|k| format!("jobs.{}.{}", name, k)),
        );
    }

    unknown
}

impl RunnerSettings for RunnerConfig {
    fn python(&self) -> &str {
        &self.runner.python
    }

    fn python3(&self) -> &str {
        &self.runner.python3
    }

    fn scripts_dir(&self) -> &Path {
        &self.runner.scripts_dir
    }
}

impl Validate for RunnerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
