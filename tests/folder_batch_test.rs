use async_trait::async_trait;
use endo_runner::domain::model::{
    AnnotatorScript, FolderBatch, FolderOutcome, Invocation, JobDefinition, JobKind,
};
use endo_runner::domain::ports::Launcher;
use endo_runner::{JobRunner, LocalWorkspace, RunnerConfig, RunnerError};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 記錄每次呼叫，依 --input 回傳預設的退出碼
#[derive(Clone, Default)]
struct RecordingLauncher {
    calls: Arc<Mutex<Vec<Invocation>>>,
    exit_codes: HashMap<PathBuf, i32>,
}

impl RecordingLauncher {
    fn failing_on(mut self, input: &Path, code: i32) -> Self {
        self.exit_codes.insert(input.to_path_buf(), code);
        self
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    fn inputs(&self) -> Vec<PathBuf> {
        self.calls()
            .iter()
            .map(|inv| {
                let pos = inv.args.iter().position(|a| a == "--input").unwrap();
                PathBuf::from(&inv.args[pos + 1])
            })
            .collect()
    }
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn launch(&self, invocation: &Invocation) -> endo_runner::Result<i32> {
        self.calls.lock().unwrap().push(invocation.clone());
        let pos = invocation.args.iter().position(|a| a == "--input").unwrap();
        let input = PathBuf::from(&invocation.args[pos + 1]);
        Ok(self.exit_codes.get(&input).copied().unwrap_or(0))
    }
}

fn mkdir(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
}

fn batch_job(parent: &Path, output_root: Option<&Path>) -> JobDefinition {
    JobDefinition::new(
        "run_folders",
        JobKind::Folders(FolderBatch {
            parent_dir: parent.to_path_buf(),
            output_suffix: "_annotated".to_string(),
            output_root: output_root.map(Path::to_path_buf),
            sampling: 5,
            annotator: AnnotatorScript::ImageAnnotator,
            fail_fast: false,
        }),
    )
}

fn runner(launcher: RecordingLauncher) -> JobRunner<RecordingLauncher, LocalWorkspace, RunnerConfig> {
    JobRunner::new(launcher, LocalWorkspace::new(), RunnerConfig::default())
}

#[tokio::test]
async fn test_skips_non_empty_output_and_processes_empty_one() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    let sub1 = parent.join("A/sub1");
    let sub2 = parent.join("A/sub2");
    mkdir(&sub1);
    mkdir(&sub2);
    mkdir(&parent.join("A/sub1_annotated"));
    std::fs::write(parent.join("A/sub1_annotated/analysis.json"), "{}").unwrap();
    mkdir(&parent.join("A/sub2_annotated"));

    let launcher = RecordingLauncher::default();
    let report = runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(launcher.inputs(), vec![sub2.clone()]);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.processed_count(), 1);
    assert_eq!(report.exit_code, 0);
    assert_eq!(
        report.folders,
        vec![
            FolderOutcome::Skipped {
                input: sub1,
                output_dir: parent.join("A/sub1_annotated"),
            },
            FolderOutcome::Processed {
                input: sub2,
                output_dir: parent.join("A/sub2_annotated"),
                exit_code: 0,
            },
        ]
    );
}

#[tokio::test]
async fn test_missing_output_dir_is_created_and_annotator_invoked_once() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("B/sub1"));
    mkdir(&parent.join("B/sub2"));

    let launcher = RecordingLauncher::default();
    runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(
        launcher.inputs(),
        vec![
            parent.join("A/sub1"),
            parent.join("B/sub1"),
            parent.join("B/sub2")
        ]
    );
    for out in ["A/sub1_annotated", "B/sub1_annotated", "B/sub2_annotated"] {
        assert!(parent.join(out).is_dir(), "{} should exist", out);
    }

    let first = &launcher.calls()[0];
    assert_eq!(first.program, "python");
    assert_eq!(first.script, PathBuf::from("./image_annotator.py"));
    assert_eq!(
        first.args,
        vec![
            OsString::from("--input"),
            parent.join("A/sub1").into_os_string(),
            OsString::from("--output-dir"),
            parent.join("A/sub1_annotated").into_os_string(),
            OsString::from("--sampling"),
            OsString::from("5"),
        ]
    );
}

#[tokio::test]
async fn test_files_are_ignored_at_both_levels() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    std::fs::write(parent.join("readme.txt"), "x").unwrap();
    std::fs::write(parent.join("A/frame_001.jpg"), "x").unwrap();

    let launcher = RecordingLauncher::default();
    runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(launcher.inputs(), vec![parent.join("A/sub1")]);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("A/sub2"));

    let launcher = RecordingLauncher::default();
    let job = batch_job(parent, None);
    runner(launcher.clone()).run_job(&job).await.unwrap();
    assert_eq!(launcher.calls().len(), 2);

    // 模擬標註程式已寫出結果
    std::fs::write(parent.join("A/sub1_annotated/result.json"), "{}").unwrap();
    std::fs::write(parent.join("A/sub2_annotated/result.json"), "{}").unwrap();

    let second = RecordingLauncher::default();
    let report = runner(second.clone()).run_job(&job).await.unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(report.skipped_count(), 2);
    // 輸出資料夾本身不會被當成輸入
    assert_eq!(report.folders.len(), 2);
}

#[tokio::test]
async fn test_suffix_named_folder_without_base_is_an_input() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    // 名稱剛好以後綴結尾，但沒有 A/frames，所以它是輸入
    mkdir(&parent.join("A/frames_annotated"));
    mkdir(&parent.join("B/sub1"));

    let launcher = RecordingLauncher::default();
    let report = runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(
        launcher.inputs(),
        vec![parent.join("A/frames_annotated"), parent.join("B/sub1")]
    );
    assert_eq!(report.processed_count(), 2);
    assert!(parent.join("A/frames_annotated_annotated").is_dir());
    assert!(parent.join("B/sub1_annotated").is_dir());
}

#[tokio::test]
async fn test_output_root_equal_to_parent_is_not_reprocessed() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    let job = batch_job(parent, Some(parent));

    let launcher = RecordingLauncher::default();
    runner(launcher.clone()).run_job(&job).await.unwrap();
    assert_eq!(launcher.inputs(), vec![parent.join("A/sub1")]);
    assert!(parent.join("A/sub1_annotated").is_dir());
    std::fs::write(parent.join("A/sub1_annotated/result.json"), "{}").unwrap();

    let second = RecordingLauncher::default();
    let report = runner(second.clone()).run_job(&job).await.unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(report.folders.len(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert!(!parent.join("A/sub1_annotated_annotated").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_folder_name_is_passed_verbatim() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    let sub = parent.join("A").join(OsStr::from_bytes(b"clip\xff"));
    mkdir(&sub);

    let launcher = RecordingLauncher::default();
    runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    let inputs = launcher.inputs();
    assert_eq!(inputs, vec![sub.clone()]);
    assert!(inputs[0].is_dir());

    let output = parent.join("A").join(OsStr::from_bytes(b"clip\xff_annotated"));
    assert!(output.is_dir());
    let args = &launcher.calls()[0].args;
    assert_eq!(args[3], output.into_os_string());
}

#[tokio::test]
async fn test_output_root_layout() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path().join("frames");
    let results = temp.path().join("results");
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("A/sub2"));
    mkdir(&results.join("A/sub1_annotated"));
    std::fs::write(results.join("A/sub1_annotated/done.json"), "{}").unwrap();

    let launcher = RecordingLauncher::default();
    let report = runner(launcher.clone())
        .run_job(&batch_job(&parent, Some(&results)))
        .await
        .unwrap();

    assert_eq!(launcher.inputs(), vec![parent.join("A/sub2")]);
    assert!(results.join("A/sub2_annotated").is_dir());
    assert!(!parent.join("A/sub2_annotated").exists());
    assert_eq!(report.skipped_count(), 1);
}

#[tokio::test]
async fn test_failure_does_not_stop_walk_and_last_exit_code_wins() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("A/sub2"));
    mkdir(&parent.join("A/sub3"));

    let launcher = RecordingLauncher::default()
        .failing_on(&parent.join("A/sub1"), 2)
        .failing_on(&parent.join("A/sub3"), 7);
    let report = runner(launcher.clone())
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(launcher.calls().len(), 3);
    assert_eq!(report.exit_code, 7);
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_trailing_skip_resets_exit_code() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("A/sub2"));
    mkdir(&parent.join("A/sub2_annotated"));
    std::fs::write(parent.join("A/sub2_annotated/done.json"), "{}").unwrap();

    let launcher = RecordingLauncher::default().failing_on(&parent.join("A/sub1"), 1);
    let report = runner(launcher)
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert_eq!(report.exit_code, 0);
}

#[tokio::test]
async fn test_fail_fast_stops_after_first_failure() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));
    mkdir(&parent.join("A/sub2"));

    let mut job = batch_job(parent, None);
    if let JobKind::Folders(ref mut batch) = job.kind {
        batch.fail_fast = true;
        batch.annotator = AnnotatorScript::GptApi;
    }

    let launcher = RecordingLauncher::default().failing_on(&parent.join("A/sub1"), 3);
    let report = runner(launcher.clone()).run_job(&job).await.unwrap();

    assert_eq!(launcher.calls().len(), 1);
    assert_eq!(launcher.calls()[0].script, PathBuf::from("./gpt_api.py"));
    assert_eq!(report.exit_code, 3);
    assert!(!parent.join("A/sub2_annotated").exists());
}

#[tokio::test]
async fn test_dry_run_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let parent = temp.path();
    mkdir(&parent.join("A/sub1"));

    let launcher = RecordingLauncher::default();
    let report = runner(launcher.clone())
        .with_dry_run(true)
        .run_job(&batch_job(parent, None))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.invocations.len(), 1);
    assert!(!parent.join("A/sub1_annotated").exists());
}

#[tokio::test]
async fn test_missing_parent_dir_is_input_error() {
    let temp = TempDir::new().unwrap();
    let launcher = RecordingLauncher::default();

    let err = runner(launcher.clone())
        .run_job(&batch_job(&temp.path().join("missing"), None))
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::InputNotFoundError { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(launcher.calls().is_empty());
}
