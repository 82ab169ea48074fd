mod cli;
mod command;
mod crop;
mod decision;
mod error;
mod lifecycle;
mod probe;
mod report;
mod runner;

use anyhow::Result;
use clap::Parser;

use cli::Cli;
use lifecycle::FileTask;
use report::Report;

fn main() -> Result<()> {
    let cfg = Cli::parse().into_config()?;
    let tools = runner::resolve_tools(cfg.ffmpeg.clone())?;
    lifecycle::ensure_dirs(&cfg.working_dir)?;
    let report = Report::new(&cfg.working_dir.join(lifecycle::LOG_DIR));

    for name in &cfg.files {
        let Some(task) = FileTask::discover(&cfg.working_dir, name) else {
            continue;
        };
        match lifecycle::acquire_lock(&task) {
            Ok(true) => {}
            // Locked by a concurrent run, or left from an earlier failure.
            Ok(false) => continue,
            Err(err) => {
                report.line(&format!("Error locking {name:?}: {err}"));
                continue;
            }
        }
        if let Err(err) = lifecycle::process_file(&cfg, &tools, &report, &task) {
            report.line(&format!("Error transcoding {name:?}: {err}"));
        }
    }
    Ok(())
}
