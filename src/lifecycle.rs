//! File lifecycle: lock, probe, decide, crop, transcode, finalize.
//!
//! The only component that touches persistent path state. Renames are the
//! sole durability mechanism: the final output name only ever appears via a
//! rename of the in-progress `.part` file after a zero exit code. On any
//! failure the lock marker and the source file are left in place so an
//! operator can inspect and re-run.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cli::AppConfig;
use crate::command;
use crate::crop::{self, CropRectangle, hms};
use crate::decision::{self, DecisionFlags};
use crate::error::AttemptError;
use crate::probe::{self, ProbeFacts};
use crate::report::{Report, StreamView};
use crate::runner::{self, Capture, Tools};

pub const INPUT_DIR: &str = "0in";
pub const OUTPUT_DIR: &str = "0out";
pub const LOG_DIR: &str = "0log";

const MEDIA_EXTENSIONS: &[&str] = &[
    "3g2", "3gp", "asf", "avi", "divx", "flv", "m2ts", "m4a", "m4v", "mj2", "mkv", "mov", "mp4",
    "mpeg", "mpg", "mts", "nuv", "ogg", "ogm", "ogv", "rm", "rmvb", "vob", "webm", "wmv",
];

pub fn eligible_extension(ext: &str) -> bool {
    MEDIA_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

/// One unit of work, created at discovery time. `file_name` is relative to
/// `working_dir`.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub working_dir: PathBuf,
    pub file_name: String,
    pub base: String,
}

impl FileTask {
    /// None when the path is not a regular file with a recognized media
    /// extension; ineligible entries are skipped silently, not errors.
    pub fn discover(working_dir: &Path, name: &str) -> Option<FileTask> {
        let source = working_dir.join(name);
        let meta = fs::metadata(&source).ok()?;
        if !meta.is_file() {
            return None;
        }
        let ext = source.extension()?.to_str()?;
        if !eligible_extension(ext) {
            return None;
        }
        let base = Path::new(name).file_stem()?.to_str()?.to_string();
        Some(FileTask {
            working_dir: working_dir.to_path_buf(),
            file_name: name.to_string(),
            base,
        })
    }

    pub fn source(&self) -> PathBuf {
        self.working_dir.join(&self.file_name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.working_dir.join(format!("{}.lock", self.file_name))
    }

    pub fn part_path(&self) -> PathBuf {
        self.working_dir
            .join(OUTPUT_DIR)
            .join(format!("{}.mkv.part", self.base))
    }

    pub fn final_path(&self) -> PathBuf {
        self.working_dir
            .join(OUTPUT_DIR)
            .join(format!("{}.mkv", self.base))
    }

    pub fn archived_path(&self) -> PathBuf {
        self.working_dir.join(INPUT_DIR).join(&self.file_name)
    }

    fn log_path(&self, suffix: &str) -> PathBuf {
        self.working_dir
            .join(LOG_DIR)
            .join(format!("{}.{suffix}", self.file_name))
    }

    pub fn error_path(&self) -> PathBuf {
        self.log_path("error")
    }

    pub fn crop_log_path(&self) -> PathBuf {
        self.log_path("crop")
    }

    pub fn transcode_log_path(&self) -> PathBuf {
        self.log_path("transcode")
    }
}

pub fn ensure_dirs(working_dir: &Path) -> io::Result<()> {
    for dir in [INPUT_DIR, OUTPUT_DIR, LOG_DIR] {
        fs::create_dir_all(working_dir.join(dir))?;
    }
    Ok(())
}

/// Claims the per-file lock marker. Creation is exclusive so two concurrent
/// invocations can never both claim the same path; an existing marker means
/// "in progress elsewhere, or failed and awaiting inspection" and is never
/// cleaned up automatically.
pub fn acquire_lock(task: &FileTask) -> io::Result<bool> {
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(task.lock_path())
    {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

/// Success path: expose the output under its final name, archive the
/// source, then release the lock.
pub fn finalize(task: &FileTask) -> io::Result<()> {
    fs::rename(task.part_path(), task.final_path())?;
    fs::rename(task.source(), task.archived_path())?;
    fs::remove_file(task.lock_path())?;
    Ok(())
}

pub fn record_failure(task: &FileTask, command: &str, tail: &[String]) -> io::Result<()> {
    write_record(&task.error_path(), command, tail)
}

fn write_record(path: &Path, command: &str, lines: &[String]) -> io::Result<()> {
    let mut f = fs::File::create(path)?;
    writeln!(f, "{command}")?;
    writeln!(f)?;
    for line in lines {
        writeln!(f, "{line}")?;
    }
    Ok(())
}

/// Runs one locked task through probe, decision, optional crop sampling,
/// and the transcode pass. Failures are recorded and returned; they never
/// propagate past the caller's per-file loop.
pub fn process_file(
    cfg: &AppConfig,
    tools: &Tools,
    report: &Report,
    task: &FileTask,
) -> Result<(), AttemptError> {
    let source = task.source();
    let started = Instant::now();
    report.line(&format!("Analyzing {:?}", task.base));

    // Metadata-only pass. ffmpeg always exits non-zero without an output
    // file, so only the diagnostic text matters here.
    let probe_args = command::probe(&source);
    let view = StreamView::start(cfg.verbose);
    let probe_run = runner::run(&tools.ffmpeg, &probe_args, &view, Capture::Full)?;
    view.finish();
    let facts = probe::parse_probe_output(probe_run.captured.as_deref().unwrap_or(""));

    let flags = DecisionFlags {
        transcode_force: cfg.transcode_force,
        deinterlace: cfg.deinterlace,
    };
    let plan = match decision::plan_streams(&facts.streams, &flags) {
        Ok(plan) => plan,
        Err(err) => {
            if let Err(io_err) = record_failure(
                task,
                &command::render(&tools.ffmpeg, &probe_args),
                &probe_run.tail,
            ) {
                report.detail(&format!("could not write error record: {io_err}"));
            }
            return Err(err);
        }
    };

    // A single copied video stream disables the frame-filter chain for the
    // whole attempt; ffmpeg rejects -filter:v next to a copy codec.
    let mut filters: Vec<String> = Vec::new();
    if !plan.video_copy && let Some((input_w, input_h)) = plan.video_size {
        if cfg.deinterlace {
            filters.push("bwdif".to_string());
        }
        if cfg.scale720p {
            if input_w > 1280 || input_h > 720 {
                filters.push("scale=1280:-2".to_string());
                report.detail("Above 720p: Scaling Enabled");
            } else {
                report.detail("Not Above 720p: Scaling Disabled");
            }
        }
        let rect = if cfg.no_crop {
            None
        } else {
            Some(detect_crop(cfg, tools, report, task, &facts, &filters)?)
        };
        report.line(&format!(
            "Analysis completed in {}",
            hms(started.elapsed().as_secs() as f64)
        ));
        report.detail(&format!(
            "Duration: {}",
            facts
                .duration
                .as_ref()
                .map(|d| d.label.as_str())
                .unwrap_or("N/A")
        ));
        report.detail(&format!("Input  Resolution: {input_w}x{input_h}"));
        if let Some(rect) = rect {
            report.detail(&format!("Output Resolution: {}x{}", rect.width, rect.height));
            filters.push(format!("crop={rect}"));
        }
    }

    let part = task.part_path();
    let transcode_args = command::transcode(&source, &part, &task.base, &plan, &filters);
    let rendered = command::render(&tools.ffmpeg, &transcode_args);
    report.detail("Transcoding Started");
    let encode_started = Instant::now();

    let view = StreamView::start(cfg.verbose);
    let run = runner::run(&tools.ffmpeg, &transcode_args, &view, Capture::TailOnly)?;
    view.finish();

    if !run.success() {
        if let Err(io_err) = record_failure(task, &rendered, &run.tail) {
            report.detail(&format!("could not write error record: {io_err}"));
        }
        return Err(AttemptError::ToolFailed {
            phase: "transcode",
            code: run.exit_code.unwrap_or(-1),
        });
    }

    let _ = write_record(&task.transcode_log_path(), &rendered, &run.tail);
    finalize(task)?;
    report.line(&format!(
        "Transcoding completed in {}\n",
        hms(encode_started.elapsed().as_secs() as f64)
    ));

    if cfg.title_tag {
        tag_title(task, report);
    }
    Ok(())
}

/// Throwaway time-windowed encode with cropdetect appended; all output is
/// discarded. A missing crop line aborts the attempt rather than guessing.
fn detect_crop(
    cfg: &AppConfig,
    tools: &Tools,
    report: &Report,
    task: &FileTask,
    facts: &ProbeFacts,
    base_filters: &[String],
) -> Result<CropRectangle, AttemptError> {
    let window = crop::sample_window(facts.duration.as_ref().map(|d| d.seconds));
    let args = command::crop_detect(&task.source(), window, base_filters);
    let view = StreamView::start(cfg.verbose);
    let run = runner::run(&tools.ffmpeg, &args, &view, Capture::Full)?;
    view.finish();

    let rendered = command::render(&tools.ffmpeg, &args);
    let _ = write_record(&task.crop_log_path(), &rendered, &run.tail);

    match crop::last_crop(run.captured.as_deref().unwrap_or("")) {
        Some(rect) => Ok(rect),
        None => {
            if let Err(io_err) = record_failure(task, &rendered, &run.tail) {
                report.detail(&format!("could not write error record: {io_err}"));
            }
            Err(AttemptError::NoCropDetected)
        }
    }
}

/// Optional finalization step; a tag failure is reported but never fails
/// the task.
fn tag_title(task: &FileTask, report: &Report) {
    let Some(bin) = runner::find_optional("mkvpropedit") else {
        report.detail("mkvpropedit not found; skipping title tag");
        return;
    };
    let args = command::title_tag(&task.final_path(), &task.base);
    match runner::run(&bin, &args, &StreamView::quiet(), Capture::TailOnly) {
        Ok(run) if run.success() => {}
        Ok(run) => report.detail(&format!(
            "title tag failed (exit code {})",
            run.exit_code.unwrap_or(-1)
        )),
        Err(err) => report.detail(&format!("title tag failed: {err}")),
    }
}
