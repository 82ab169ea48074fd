//! Argument-vector assembly for the ffmpeg passes. Building structured
//! vectors rather than strings sidesteps quoting entirely.

use std::ffi::OsString;
use std::path::Path;

use crate::crop::{SampleWindow, hms};
use crate::decision::{AttemptPlan, AudioAction, PlannedCodec, SubtitleAction, VideoAction};

const LAYOUT_NORMALIZE: &str = "aformat=channel_layouts=7.1|5.1|stereo|mono";

/// Metadata-only pass; no output file on purpose.
pub fn probe(input: &Path) -> Vec<OsString> {
    vec!["-i".into(), input.into()]
}

pub fn crop_detect(input: &Path, window: SampleWindow, base_filters: &[String]) -> Vec<OsString> {
    let mut chain = base_filters.to_vec();
    chain.push("cropdetect".to_string());
    vec![
        "-i".into(),
        input.into(),
        "-ss".into(),
        hms(window.start).into(),
        "-t".into(),
        hms(window.length).into(),
        "-filter:v".into(),
        chain.join(",").into(),
        "-an".into(),
        "-sn".into(),
        "-f".into(),
        "rawvideo".into(),
        "-y".into(),
        null_sink().into(),
    ]
}

pub fn transcode(
    input: &Path,
    part_output: &Path,
    title: &str,
    plan: &AttemptPlan,
    filters: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.into()];

    if !filters.is_empty() {
        args.push("-filter:v".into());
        args.push(filters.join(",").into());
    }

    for m in &plan.mapped {
        args.push("-map".into());
        args.push(format!("0:{}", m.input_index).into());
    }

    for m in &plan.mapped {
        let n = m.out_index;
        match &m.codec {
            PlannedCodec::Video(VideoAction::Copy) => {
                push2(&mut args, format!("-c:v:{n}"), "copy");
            }
            PlannedCodec::Video(VideoAction::Encode) => {
                push2(&mut args, format!("-c:v:{n}"), "libx265");
                push2(&mut args, format!("-profile:v:{n}"), "main");
                push2(&mut args, format!("-pix_fmt:v:{n}"), "yuv420p");
            }
            PlannedCodec::Audio(AudioAction::Copy) => {
                push2(&mut args, format!("-c:a:{n}"), "copy");
            }
            PlannedCodec::Audio(AudioAction::Encode {
                bitrate,
                normalize_layout,
            }) => {
                if *normalize_layout {
                    push2(&mut args, format!("-filter:a:{n}"), LAYOUT_NORMALIZE);
                }
                push2(&mut args, format!("-c:a:{n}"), "libopus");
                push2(&mut args, format!("-b:a:{n}"), *bitrate);
            }
            PlannedCodec::Subtitle(SubtitleAction::ConvertAss) => {
                push2(&mut args, format!("-c:s:{n}"), "ass");
            }
            PlannedCodec::Subtitle(SubtitleAction::Copy) => {
                push2(&mut args, format!("-c:s:{n}"), "copy");
            }
        }
    }

    push2(&mut args, "-metadata", format!("title={title}"));
    args.push("-y".into());
    push2(&mut args, "-f", "matroska");
    push2(&mut args, "-max_muxing_queue_size", "1024");
    args.push(part_output.into());
    args
}

/// mkvpropedit arguments for the optional finalization tag.
pub fn title_tag(output: &Path, title: &str) -> Vec<OsString> {
    vec![
        output.into(),
        "--edit".into(),
        "info".into(),
        "--set".into(),
        format!("title={title}").into(),
    ]
}

/// Human-readable command line for error records and logs.
pub fn render(program: &Path, args: &[OsString]) -> String {
    let mut s = program.display().to_string();
    for a in args {
        s.push(' ');
        s.push_str(&a.to_string_lossy());
    }
    s
}

fn push2(args: &mut Vec<OsString>, key: impl Into<OsString>, value: impl Into<OsString>) {
    args.push(key.into());
    args.push(value.into());
}

fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}
