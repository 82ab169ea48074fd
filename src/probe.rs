//! Extracts structured stream facts from ffmpeg's diagnostic text.
//!
//! ffmpeg has no machine-readable probe mode that is stable across the
//! versions we run against, so stream declarations are recognized by their
//! textual markers. All of the pattern-matching fragility lives here; the
//! rest of the program only ever sees typed descriptors.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// One elementary stream, as declared by a `Stream #0:<n>` line.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub index: u32,
    pub kind: StreamKind,
    pub codec: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pix_fmt: Option<String>,
    pub channel_layout: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaDuration {
    pub seconds: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeFacts {
    pub streams: Vec<StreamDescriptor>,
    /// None when the probe printed no duration, or printed `N/A`.
    pub duration: Option<MediaDuration>,
}

pub fn parse_probe_output(text: &str) -> ProbeFacts {
    let stream_re = Regex::new(r"Stream #0:(\d+)").unwrap();
    let mut streams = Vec::new();
    for line in text.lines() {
        let Some(caps) = stream_re.captures(line) else {
            continue;
        };
        let index: u32 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let Some(kind) = stream_kind(line) else {
            continue;
        };
        streams.push(parse_stream(index, kind, line));
    }
    ProbeFacts {
        streams,
        duration: last_duration(text),
    }
}

fn stream_kind(line: &str) -> Option<StreamKind> {
    if line.contains("Video") {
        Some(StreamKind::Video)
    } else if line.contains("Audio") {
        Some(StreamKind::Audio)
    } else if line.contains("Subtitle") {
        Some(StreamKind::Subtitle)
    } else {
        None
    }
}

fn parse_stream(index: u32, kind: StreamKind, line: &str) -> StreamDescriptor {
    let mut desc = StreamDescriptor {
        index,
        kind,
        codec: codec_tag(line, kind),
        width: None,
        height: None,
        pix_fmt: None,
        channel_layout: None,
    };
    match kind {
        StreamKind::Video => {
            if let Some((w, h)) = resolution(line) {
                desc.width = Some(w);
                desc.height = Some(h);
            }
            desc.pix_fmt = pix_fmt(line);
        }
        StreamKind::Audio => desc.channel_layout = channel_layout(line),
        StreamKind::Subtitle => {}
    }
    desc
}

fn codec_tag(line: &str, kind: StreamKind) -> String {
    let marker = match kind {
        StreamKind::Video => "Video: ",
        StreamKind::Audio => "Audio: ",
        StreamKind::Subtitle => "Subtitle: ",
    };
    line.split_once(marker)
        .and_then(|(_, rest)| rest.split([',', ' ', '(']).next())
        .unwrap_or_default()
        .to_string()
}

fn resolution(line: &str) -> Option<(u32, u32)> {
    // Some builds leave a stray comma glued onto the WxH token.
    let re = Regex::new(r"([0-9]{2,}x[0-9]+,?)").unwrap();
    let token = re.captures(line)?.get(1)?.as_str().trim_end_matches(',');
    let (w, h) = token.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn pix_fmt(line: &str) -> Option<String> {
    let rest = line.split_once("Video: ")?.1;
    let field = rest.split(", ").nth(1)?;
    let token = field.split('(').next()?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// The layout label is the comma field following the `<rate> Hz` field,
/// e.g. `Audio: ac3, 48000 Hz, 5.1(side), fltp, 384 kb/s`.
fn channel_layout(line: &str) -> Option<String> {
    let rest = line.split_once("Audio: ")?.1;
    let mut fields = rest.split(',').map(str::trim);
    while let Some(field) = fields.next() {
        if field.ends_with(" Hz") {
            return fields
                .next()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
        }
    }
    None
}

/// The probe may print more than one duration line; the last one wins.
fn last_duration(text: &str) -> Option<MediaDuration> {
    let re = Regex::new(r"Duration: ([^,\n]+),").unwrap();
    let label = re
        .captures_iter(text)
        .last()?
        .get(1)?
        .as_str()
        .trim()
        .to_string();
    let seconds = parse_timestamp(&label)?;
    Some(MediaDuration { seconds, label })
}

pub fn parse_timestamp(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let h: f64 = parts.next()?.trim().parse().ok()?;
    let m: f64 = parts.next()?.trim().parse().ok()?;
    let sec: f64 = parts.next()?.trim().parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + sec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Input #0, matroska,webm, from 'movie.mkv':
  Duration: 01:30:00.00, start: 0.000000, bitrate: 2240 kb/s
  Stream #0:0(eng): Video: h264 (High), yuv420p(tv, bt709, progressive), 1920x808 [SAR 1:1 DAR 240:101], 23.98 fps, 23.98 tbr, 1k tbn (default)
  Stream #0:1(eng): Audio: ac3, 48000 Hz, 5.1(side), fltp, 384 kb/s (default)
  Stream #0:2(eng): Subtitle: subrip (default)
";

    #[test]
    fn test_parses_all_streams() {
        let facts = parse_probe_output(SAMPLE);
        assert_eq!(facts.streams.len(), 3);

        let v = &facts.streams[0];
        assert_eq!(v.index, 0);
        assert_eq!(v.kind, StreamKind::Video);
        assert_eq!(v.codec, "h264");
        assert_eq!(v.width, Some(1920));
        assert_eq!(v.height, Some(808));
        assert_eq!(v.pix_fmt.as_deref(), Some("yuv420p"));

        let a = &facts.streams[1];
        assert_eq!(a.index, 1);
        assert_eq!(a.kind, StreamKind::Audio);
        assert_eq!(a.codec, "ac3");
        assert_eq!(a.channel_layout.as_deref(), Some("5.1(side)"));

        let s = &facts.streams[2];
        assert_eq!(s.kind, StreamKind::Subtitle);
        assert_eq!(s.codec, "subrip");
    }

    #[test]
    fn test_duration_is_last_match() {
        let text = "  Duration: 00:00:30.00, start: 0.0\n  Duration: 01:30:00.00, start: 0.0\n";
        let d = parse_probe_output(text).duration.unwrap();
        assert_eq!(d.label, "01:30:00.00");
        assert!((d.seconds - 5400.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_na_is_unknown() {
        let text = "  Duration: N/A, bitrate: N/A\n";
        assert!(parse_probe_output(text).duration.is_none());
    }

    #[test]
    fn test_no_streams_yields_empty_list() {
        let facts = parse_probe_output("ffmpeg version 6.0\nSome chatter\n");
        assert!(facts.streams.is_empty());
        assert!(facts.duration.is_none());
    }

    #[test]
    fn test_resolution_tolerates_trailing_comma() {
        let line = "  Stream #0:0: Video: mpeg4, yuv420p, 720x480, 29.97 fps";
        let facts = parse_probe_output(line);
        assert_eq!(facts.streams[0].width, Some(720));
        assert_eq!(facts.streams[0].height, Some(480));
    }

    #[test]
    fn test_video_without_resolution() {
        let line = "  Stream #0:0: Video: h264";
        let facts = parse_probe_output(line);
        assert_eq!(facts.streams[0].width, None);
        assert_eq!(facts.streams[0].height, None);
    }

    #[test]
    fn test_audio_without_layout_field() {
        let line = "  Stream #0:1: Audio: mp3";
        let facts = parse_probe_output(line);
        assert_eq!(facts.streams[0].channel_layout, None);
    }

    #[test]
    fn test_plain_stereo_layout() {
        let line = "  Stream #0:1: Audio: aac (LC), 44100 Hz, stereo, fltp, 128 kb/s";
        let facts = parse_probe_output(line);
        assert_eq!(facts.streams[0].channel_layout.as_deref(), Some("stereo"));
    }

    #[test]
    fn test_timestamp_parse() {
        assert_eq!(parse_timestamp("01:30:00.00"), Some(5400.0));
        assert_eq!(parse_timestamp("00:00:05.50"), Some(5.5));
        assert_eq!(parse_timestamp("N/A"), None);
    }
}
