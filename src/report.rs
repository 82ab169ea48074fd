//! Operator output: timestamped phase lines mirrored to the batch log, and
//! the live single-line view of a running child's diagnostic stream.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};

const INDENT: &str = "        ";

pub struct Report {
    log_file: PathBuf,
}

impl Report {
    pub fn new(log_dir: &Path) -> Self {
        Report {
            log_file: log_dir.join("0transcode.log"),
        }
    }

    /// Wall-clock stamped phase line.
    pub fn line(&self, msg: &str) {
        self.emit(&format!("{} {msg}", Local::now().format("%H:%M:%S")));
    }

    /// Indented continuation of the previous phase line.
    pub fn detail(&self, msg: &str) {
        self.emit(&format!("{INDENT}{msg}"));
    }

    fn emit(&self, s: &str) {
        println!("{s}");
        // Log mirroring is best effort; operator output must not fail a task.
        if let Ok(mut f) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
        {
            let _ = writeln!(f, "{s}");
        }
    }
}

/// Renders each diagnostic line by overwriting the current terminal line.
/// Cloned into the reader thread; `ProgressBar` shares state across clones.
#[derive(Clone)]
pub struct StreamView {
    spinner: Option<ProgressBar>,
    verbose: bool,
}

impl StreamView {
    pub fn start(verbose: bool) -> Self {
        if verbose {
            return StreamView {
                spinner: None,
                verbose: true,
            };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {wide_msg}")
                .unwrap()
                .tick_strings(&["-", "\\", "|", "/"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        StreamView {
            spinner: Some(spinner),
            verbose: false,
        }
    }

    /// No display at all; used for short passes and in tests.
    pub fn quiet() -> Self {
        StreamView {
            spinner: None,
            verbose: false,
        }
    }

    pub fn line(&self, line: &str) {
        if self.verbose {
            println!("{line}");
        } else if let Some(spinner) = &self.spinner {
            spinner.set_message(line.to_string());
        }
    }

    pub fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}
