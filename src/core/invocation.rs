use crate::domain::model::{AnnotatorScript, ConcatMode, Invocation, JobDefinition, JobKind};
use crate::domain::ports::RunnerSettings;
use std::path::Path;

/// 任務的 interpreter 設定優先，其次 text_improver 用 python3，其餘用 python
pub fn interpreter_for<'a, S: RunnerSettings>(settings: &'a S, job: &'a JobDefinition) -> &'a str {
    match (&job.interpreter, &job.kind) {
        (Some(custom), _) => custom.as_str(),
        (None, JobKind::TextImprove { .. }) => settings.python3(),
        (None, _) => settings.python(),
    }
}

/// 組出單一任務的命令列；folders 任務回傳 None，由資料夾批次逐一產生
pub fn build_invocation<S: RunnerSettings>(settings: &S, job: &JobDefinition) -> Option<Invocation> {
    let program = interpreter_for(settings, job);
    let script = |name: &str| settings.scripts_dir().join(name);

    let invocation = match &job.kind {
        JobKind::TextImprove {
            input_file,
            output_file,
            chunk_size,
        } => Invocation::new(program, script("text_improver.py"))
            .arg(input_file)
            .opt_flag("--output_file", output_file.as_ref())
            .opt_flag("--chunk_size", chunk_size.map(|n| n.to_string())),
        JobKind::Nose {
            input,
            output_dir,
            prompt,
            sampling,
        } => Invocation::new(program, script("gpt_nose.py"))
            .flag("--input", input)
            .flag("--output-dir", output_dir)
            .flag("--prompt", prompt)
            .opt_flag("--sampling", sampling.map(|n| n.to_string())),
        JobKind::GptApi {
            input,
            output_dir,
            sampling,
        } => annotator_invocation(
            program,
            settings.scripts_dir(),
            AnnotatorScript::GptApi,
            input,
            output_dir,
            *sampling,
        ),
        JobKind::ImageAnnotator {
            input,
            output_dir,
            sampling,
        } => annotator_invocation(
            program,
            settings.scripts_dir(),
            AnnotatorScript::ImageAnnotator,
            input,
            output_dir,
            *sampling,
        ),
        JobKind::Concat { mode, dir } => {
            let flag = match mode {
                ConcatMode::Full => "--full",
                ConcatMode::Single => "--single",
            };
            Invocation::new(program, script("concat_images.py")).flag(flag, dir)
        }
        JobKind::VideoFrames {
            input,
            output,
            max_frames,
            rotate,
            target_fps,
            exifmodel,
            verbose,
        } => {
            let inv = Invocation::new(program, script("video2frame_fps.py"))
                .flag("--input", input)
                .flag("--output", output)
                .opt_flag("--maxframes", max_frames.map(|n| n.to_string()))
                .opt_flag("--rotate", rotate.map(|r| r.to_string()))
                .opt_flag("--target_fps", target_fps.map(|f| f.to_string()))
                .opt_flag("--exifmodel", exifmodel.as_ref());
            if *verbose {
                inv.arg("--verbose")
            } else {
                inv
            }
        }
        JobKind::Folders(_) => return None,
    };

    Some(invocation)
}

/// 單一資料夾的標註指令 (gpt_api.py / image_annotator.py)
pub fn annotator_invocation(
    program: &str,
    scripts_dir: &Path,
    annotator: AnnotatorScript,
    input: &Path,
    output_dir: &Path,
    sampling: u32,
) -> Invocation {
    Invocation::new(program, scripts_dir.join(annotator.file_name()))
        .flag("--input", input)
        .flag("--output-dir", output_dir)
        .flag("--sampling", sampling.to_string())
}
