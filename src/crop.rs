//! Crop rectangle sampling: window selection and diagnostic-text extraction.

use std::fmt;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRectangle {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for CropRectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    pub start: f64,
    pub length: f64,
}

/// Known durations over a minute get a proportional window; otherwise fall
/// back to a fixed 60 second sample from the start.
pub fn sample_window(duration_secs: Option<f64>) -> SampleWindow {
    match duration_secs {
        Some(d) if d > 60.0 => SampleWindow {
            start: d / 10.0,
            length: d / 100.0,
        },
        _ => SampleWindow {
            start: 0.0,
            length: 60.0,
        },
    }
}

/// cropdetect emits one candidate per sampled frame; the last one is the
/// converged estimate.
pub fn last_crop(text: &str) -> Option<CropRectangle> {
    let re = Regex::new(r"crop=(\d+):(\d+):(\d+):(\d+)").unwrap();
    let caps = re.captures_iter(text).last()?;
    Some(CropRectangle {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
        x: caps[3].parse().ok()?,
        y: caps[4].parse().ok()?,
    })
}

/// `HH:MM:SS` form accepted by ffmpeg `-ss`/`-t`, with milliseconds only
/// when the value is not whole seconds.
pub fn hms(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = total_ms / 1000;
    let (h, m, sec) = (s / 3600, (s % 3600) / 60, s % 60);
    if ms == 0 {
        format!("{h:02}:{m:02}:{sec:02}")
    } else {
        format!("{h:02}:{m:02}:{sec:02}.{ms:03}")
    }
}
