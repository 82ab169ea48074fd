//! Per-stream codec and filter policy.
//!
//! Pure functions of the probed descriptors and the run flags. Output
//! stream ordinals are accumulated locally per attempt, never shared.

use crate::error::AttemptError;
use crate::probe::{StreamDescriptor, StreamKind};

const TARGET_VIDEO_TAGS: &[&str] = &["h265", "hevc"];
const STILL_IMAGE_TAGS: &[&str] = &["mjpeg", "png"];
const TEXT_SUBTITLE_TAGS: &[&str] = &["srt", "ssa", "subrip", "mov_text"];

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionFlags {
    pub transcode_force: bool,
    pub deinterlace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAction {
    Copy,
    Encode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioAction {
    Copy,
    Encode {
        bitrate: &'static str,
        normalize_layout: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleAction {
    Copy,
    ConvertAss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedCodec {
    Video(VideoAction),
    Audio(AudioAction),
    Subtitle(SubtitleAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedStream {
    pub input_index: u32,
    /// Ordinal within the output streams of the same kind (`-c:v:<n>` etc).
    pub out_index: u32,
    pub codec: PlannedCodec,
}

#[derive(Debug, Clone, Default)]
pub struct AttemptPlan {
    pub mapped: Vec<MappedStream>,
    /// True when any video stream is stream-copied; frame filters cannot
    /// apply to a copied stream, so the whole filter chain is skipped.
    pub video_copy: bool,
    /// Input resolution of the first re-encoded video stream.
    pub video_size: Option<(u32, u32)>,
}

pub fn plan_streams(
    streams: &[StreamDescriptor],
    flags: &DecisionFlags,
) -> Result<AttemptPlan, AttemptError> {
    let mut plan = AttemptPlan::default();
    let (mut video_n, mut audio_n, mut subtitle_n) = (0u32, 0u32, 0u32);

    for desc in streams {
        match desc.kind {
            StreamKind::Video => {
                // Embedded cover art is a "video" stream; never map it.
                if STILL_IMAGE_TAGS.contains(&desc.codec.as_str()) {
                    continue;
                }
                let action = if !flags.transcode_force
                    && !flags.deinterlace
                    && TARGET_VIDEO_TAGS.contains(&desc.codec.as_str())
                {
                    plan.video_copy = true;
                    VideoAction::Copy
                } else {
                    let (w, h) = match (desc.width, desc.height) {
                        (Some(w), Some(h)) => (w, h),
                        _ => return Err(AttemptError::MissingResolution { index: desc.index }),
                    };
                    if plan.video_size.is_none() {
                        plan.video_size = Some((w, h));
                    }
                    VideoAction::Encode
                };
                plan.mapped.push(MappedStream {
                    input_index: desc.index,
                    out_index: video_n,
                    codec: PlannedCodec::Video(action),
                });
                video_n += 1;
            }
            StreamKind::Audio => {
                let action = if desc.codec == "opus" {
                    AudioAction::Copy
                } else {
                    let layout = desc.channel_layout.as_deref().unwrap_or("");
                    AudioAction::Encode {
                        bitrate: audio_bitrate(layout),
                        normalize_layout: is_side_layout(layout),
                    }
                };
                plan.mapped.push(MappedStream {
                    input_index: desc.index,
                    out_index: audio_n,
                    codec: PlannedCodec::Audio(action),
                });
                audio_n += 1;
            }
            StreamKind::Subtitle => {
                let action = if TEXT_SUBTITLE_TAGS.contains(&desc.codec.as_str()) {
                    SubtitleAction::ConvertAss
                } else {
                    SubtitleAction::Copy
                };
                plan.mapped.push(MappedStream {
                    input_index: desc.index,
                    out_index: subtitle_n,
                    codec: PlannedCodec::Subtitle(action),
                });
                subtitle_n += 1;
            }
        }
    }

    Ok(plan)
}

/// Opus bitrate by channel-layout label. Matches the base label exactly so
/// that `5.1` never swallows `6.1`.
pub fn audio_bitrate(layout: &str) -> &'static str {
    let base = layout.split('(').next().unwrap_or("").trim();
    match base {
        "mono" => "48k",
        "stereo" | "downmix" => "96k",
        "2.1" | "3.0" | "4.0" | "quad" | "4.1" | "5.0" | "5.1" | "6.0" | "hexagonal" => "128k",
        "6.1" | "7.0" | "7.1" | "octagonal" | "hexadecagonal" => "256k",
        _ => "256k",
    }
}

/// libopus rejects side-channel layouts; those streams get an aformat
/// normalization filter in front of the encoder.
pub fn is_side_layout(layout: &str) -> bool {
    layout.contains("(side)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(index: u32, codec: &str, size: Option<(u32, u32)>) -> StreamDescriptor {
        StreamDescriptor {
            index,
            kind: StreamKind::Video,
            codec: codec.to_string(),
            width: size.map(|(w, _)| w),
            height: size.map(|(_, h)| h),
            pix_fmt: Some("yuv420p".to_string()),
            channel_layout: None,
        }
    }

    fn audio(index: u32, codec: &str, layout: Option<&str>) -> StreamDescriptor {
        StreamDescriptor {
            index,
            kind: StreamKind::Audio,
            codec: codec.to_string(),
            width: None,
            height: None,
            pix_fmt: None,
            channel_layout: layout.map(|s| s.to_string()),
        }
    }

    fn subtitle(index: u32, codec: &str) -> StreamDescriptor {
        StreamDescriptor {
            index,
            kind: StreamKind::Subtitle,
            codec: codec.to_string(),
            width: None,
            height: None,
            pix_fmt: None,
            channel_layout: None,
        }
    }

    #[test]
    fn test_hevc_video_is_copied_and_sets_flag() {
        for codec in ["hevc", "h265"] {
            let plan =
                plan_streams(&[video(0, codec, Some((1920, 1080)))], &DecisionFlags::default())
                    .unwrap();
            assert!(plan.video_copy);
            assert_eq!(
                plan.mapped[0].codec,
                PlannedCodec::Video(VideoAction::Copy)
            );
        }
    }

    #[test]
    fn test_force_flag_defeats_copy() {
        let flags = DecisionFlags {
            transcode_force: true,
            deinterlace: false,
        };
        let plan = plan_streams(&[video(0, "hevc", Some((1920, 1080)))], &flags).unwrap();
        assert!(!plan.video_copy);
        assert_eq!(
            plan.mapped[0].codec,
            PlannedCodec::Video(VideoAction::Encode)
        );
    }

    #[test]
    fn test_deinterlace_defeats_copy() {
        let flags = DecisionFlags {
            transcode_force: false,
            deinterlace: true,
        };
        let plan = plan_streams(&[video(0, "hevc", Some((1920, 1080)))], &flags).unwrap();
        assert!(!plan.video_copy);
    }

    #[test]
    fn test_h264_video_is_reencoded() {
        let plan =
            plan_streams(&[video(0, "h264", Some((1920, 808)))], &DecisionFlags::default())
                .unwrap();
        assert!(!plan.video_copy);
        assert_eq!(plan.video_size, Some((1920, 808)));
        assert_eq!(
            plan.mapped[0].codec,
            PlannedCodec::Video(VideoAction::Encode)
        );
    }

    #[test]
    fn test_still_image_stream_never_mapped() {
        let plan = plan_streams(
            &[
                video(0, "mjpeg", None),
                video(1, "png", None),
                video(2, "h264", Some((1280, 720))),
            ],
            &DecisionFlags::default(),
        )
        .unwrap();
        assert_eq!(plan.mapped.len(), 1);
        assert_eq!(plan.mapped[0].input_index, 2);
        assert_eq!(plan.mapped[0].out_index, 0);
    }

    #[test]
    fn test_missing_resolution_is_hard_error() {
        let err = plan_streams(&[video(3, "h264", None)], &DecisionFlags::default()).unwrap_err();
        assert!(matches!(err, AttemptError::MissingResolution { index: 3 }));
    }

    #[test]
    fn test_opus_audio_is_copied() {
        let plan =
            plan_streams(&[audio(0, "opus", Some("stereo"))], &DecisionFlags::default()).unwrap();
        assert_eq!(plan.mapped[0].codec, PlannedCodec::Audio(AudioAction::Copy));
    }

    #[test]
    fn test_audio_bitrate_lookup() {
        assert_eq!(audio_bitrate("mono"), "48k");
        assert_eq!(audio_bitrate("stereo"), "96k");
        assert_eq!(audio_bitrate("downmix"), "96k");
        assert_eq!(audio_bitrate("5.1"), "128k");
        assert_eq!(audio_bitrate("5.1(side)"), "128k");
        assert_eq!(audio_bitrate("quad"), "128k");
        assert_eq!(audio_bitrate("6.1"), "256k");
        assert_eq!(audio_bitrate("7.1(wide)"), "256k");
        assert_eq!(audio_bitrate("hexadecagonal"), "256k");
        assert_eq!(audio_bitrate("something-new"), "256k");
        assert_eq!(audio_bitrate(""), "256k");
    }

    #[test]
    fn test_side_layout_requires_normalization() {
        let plan = plan_streams(
            &[
                audio(0, "ac3", Some("5.1(side)")),
                audio(1, "ac3", Some("5.1")),
            ],
            &DecisionFlags::default(),
        )
        .unwrap();
        assert_eq!(
            plan.mapped[0].codec,
            PlannedCodec::Audio(AudioAction::Encode {
                bitrate: "128k",
                normalize_layout: true,
            })
        );
        assert_eq!(
            plan.mapped[1].codec,
            PlannedCodec::Audio(AudioAction::Encode {
                bitrate: "128k",
                normalize_layout: false,
            })
        );
    }

    #[test]
    fn test_subtitle_policy() {
        let plan = plan_streams(
            &[
                subtitle(0, "subrip"),
                subtitle(1, "ass"),
                subtitle(2, "hdmv_pgs_subtitle"),
            ],
            &DecisionFlags::default(),
        )
        .unwrap();
        assert_eq!(
            plan.mapped[0].codec,
            PlannedCodec::Subtitle(SubtitleAction::ConvertAss)
        );
        assert_eq!(
            plan.mapped[1].codec,
            PlannedCodec::Subtitle(SubtitleAction::Copy)
        );
        assert_eq!(
            plan.mapped[2].codec,
            PlannedCodec::Subtitle(SubtitleAction::Copy)
        );
    }

    #[test]
    fn test_per_kind_ordinals_are_local() {
        let plan = plan_streams(
            &[
                video(0, "h264", Some((1920, 1080))),
                audio(1, "ac3", Some("stereo")),
                audio(2, "aac", Some("mono")),
                subtitle(3, "subrip"),
            ],
            &DecisionFlags::default(),
        )
        .unwrap();
        let ordinals: Vec<u32> = plan.mapped.iter().map(|m| m.out_index).collect();
        assert_eq!(ordinals, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_empty_descriptor_list_is_allowed() {
        let plan = plan_streams(&[], &DecisionFlags::default()).unwrap();
        assert!(plan.mapped.is_empty());
        assert!(!plan.video_copy);
    }
}
