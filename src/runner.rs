//! Launches the external tool and streams its diagnostic output.
//!
//! The stderr reader runs on its own thread so draining keeps pace with the
//! child while the caller blocks in `wait()`; a stalled pipe would otherwise
//! block the encoder. A non-zero exit is a value in the outcome, never an
//! `Err` — the lifecycle manager decides what it means for the file.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use which::which;

use crate::report::StreamView;

/// Trailing diagnostic lines retained for error records.
pub const TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct Tools {
    pub ffmpeg: PathBuf,
}

pub fn resolve_tools(ffmpeg: Option<PathBuf>) -> Result<Tools> {
    Ok(Tools {
        ffmpeg: resolve_bin(ffmpeg, "ffmpeg")?,
    })
}

/// Lookup for tools whose absence is tolerated (mkvpropedit).
pub fn find_optional(name: &str) -> Option<PathBuf> {
    which(name).ok()
}

fn resolve_bin(bin_opt: Option<PathBuf>, default: &str) -> Result<PathBuf> {
    if let Some(path) = bin_opt {
        if path.is_file() {
            return Ok(path);
        }
        anyhow::bail!("Provided binary not found: {}", path.display());
    }

    which(default)
        .or_else(|_| {
            if cfg!(windows) {
                which(format!("{default}.exe"))
            } else {
                Err(which::Error::CannotFindBinaryPath)
            }
        })
        .with_context(|| format!("`{default}` not found in PATH"))
}

#[derive(Debug, Clone, Copy)]
pub enum Capture {
    /// Keep only the trailing ring buffer. Used for encode passes, whose
    /// output is unbounded.
    TailOnly,
    /// Additionally keep the full text. Only for short passes (probe,
    /// time-windowed crop detection).
    Full,
}

#[derive(Debug)]
pub struct RunOutcome {
    /// None when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub tail: Vec<String>,
    pub captured: Option<String>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub fn run(
    program: &Path,
    args: &[OsString],
    view: &StreamView,
    capture: Capture,
) -> Result<RunOutcome> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {}", program.display()))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("failed to capture stderr"))?;

    let view = view.clone();
    let capture_full = matches!(capture, Capture::Full);
    let reader = thread::spawn(move || -> io::Result<(TailBuf, Option<String>)> {
        let mut tail = TailBuf::default();
        let mut full = capture_full.then(String::new);
        split_diag_lines(stderr, |line| {
            view.line(line);
            if let Some(buf) = full.as_mut() {
                buf.push_str(line);
                buf.push('\n');
            }
            tail.push(line);
        })?;
        Ok((tail, full))
    });

    let status = child.wait().context("failed to wait for child")?;
    let (tail, captured) = reader
        .join()
        .map_err(|_| anyhow!("diagnostic reader thread panicked"))?
        .context("failed to read diagnostic stream")?;

    Ok(RunOutcome {
        exit_code: status.code(),
        tail: tail.into_lines(),
        captured,
    })
}

/// Fixed-capacity ring of the newest diagnostic lines.
#[derive(Debug, Default)]
pub struct TailBuf {
    lines: VecDeque<String>,
}

impl TailBuf {
    pub fn push(&mut self, line: &str) {
        if self.lines.len() == TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

/// Splits the diagnostic byte stream on both `\n` and `\r`: ffmpeg
/// terminates its in-place progress lines with bare carriage returns.
/// Empty lines are dropped.
pub fn split_diag_lines<R: Read>(reader: R, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut reader = reader;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    f(&String::from_utf8_lossy(&pending));
                    pending.clear();
                }
            } else {
                pending.push(byte);
            }
        }
    }
    if !pending.is_empty() {
        f(&String::from_utf8_lossy(&pending));
    }
    Ok(())
}
