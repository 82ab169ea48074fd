use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueHint};

#[derive(Parser, Debug)]
#[command(
    name = "mkvbatch",
    version,
    about = "Batch transcode media files to Matroska (HEVC video, Opus audio) with ffmpeg"
)]
pub struct Cli {
    /// Directory whose listing is processed in sorted order
    #[arg(short = 'd', long, value_hint = ValueHint::DirPath, conflicts_with = "files")]
    pub directory: Option<PathBuf>,

    /// Comma separated list of files in the current directory
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub files: Option<Vec<String>>,

    /// Deinterlace videos
    #[arg(long, action = ArgAction::SetTrue)]
    pub deinterlace: bool,

    /// Scale videos above 720p down to 720p
    #[arg(long = "scale720p", action = ArgAction::SetTrue)]
    pub scale720p: bool,

    /// Transcode the video stream even when it is already HEVC
    #[arg(short = 't', long, action = ArgAction::SetTrue)]
    pub transcode_force: bool,

    /// Skip crop detection
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_crop: bool,

    /// Set the container title on finished outputs with mkvpropedit
    #[arg(long, action = ArgAction::SetTrue)]
    pub title_tag: bool,

    /// Path to ffmpeg binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg: Option<PathBuf>,

    /// Show every ffmpeg diagnostic line instead of the single-line display
    #[arg(long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub working_dir: PathBuf,
    /// File names relative to `working_dir`, in processing order.
    pub files: Vec<String>,
    pub deinterlace: bool,
    pub scale720p: bool,
    pub transcode_force: bool,
    pub no_crop: bool,
    pub title_tag: bool,
    pub verbose: bool,
    pub ffmpeg: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig> {
        let (working_dir, files) = match (self.directory, self.files) {
            (Some(dir), _) => {
                if !dir.is_dir() {
                    bail!("not a directory: {}", dir.display());
                }
                let files = sorted_listing(&dir)?;
                (dir, files)
            }
            (None, Some(files)) => (current_dir()?, files),
            (None, None) => {
                let cwd = current_dir()?;
                let files = sorted_listing(&cwd)?;
                (cwd, files)
            }
        };

        Ok(AppConfig {
            working_dir,
            files,
            deinterlace: self.deinterlace,
            scale720p: self.scale720p,
            transcode_force: self.transcode_force,
            no_crop: self.no_crop,
            title_tag: self.title_tag,
            verbose: self.verbose,
            ffmpeg: self.ffmpeg,
        })
    }
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("cannot determine current directory")
}

pub fn sorted_listing(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("cannot list {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}
