//! Progress extraction from backend console output
//!
//! Both parsers are best-effort: a line that does not look like a progress
//! readout produces an empty [`ProgressUpdate`], never an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Fields extracted from one line of backend output
///
/// Absent fields mean "not reported on this line"; callers merge them into
/// existing job state instead of overwriting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Percent complete, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    /// Transfer rate as printed by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    /// Remaining time as printed by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
}

impl ProgressUpdate {
    /// True when the line carried nothing
    pub fn is_empty(&self) -> bool {
        self.percent.is_none() && self.speed.is_none() && self.eta.is_none()
    }
}

// Patterns are literals; `None` would only mean a typo and degrades to "no progress".
static SEGMENT_PERCENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\((\d+)%\)").ok());
static SEGMENT_SPEED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"DL:([^\s\]]+)").ok());
static SEGMENT_ETA: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"ETA:([^\]]+)").ok());

static BAR_PERCENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d{1,3})%\|").ok());
static BAR_ETA: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<([^,\]]+)").ok());
static BAR_SPEED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r",\s*([^,\]]+/s)\s*\]").ok());

fn capture(re: &LazyLock<Option<Regex>>, line: &str) -> Option<String> {
    let re = re.as_ref()?;
    let value = re.captures(line)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn capture_percent(re: &LazyLock<Option<Regex>>, line: &str) -> Option<u8> {
    capture(re, line)?
        .parse::<u32>()
        .ok()
        .map(|p| p.min(100) as u8)
}

/// Parse one aria2c console readout line
///
/// Only lines carrying both a segment marker (`[#`) and a rate marker (`DL:`)
/// are considered, e.g. `[#a1b2 10MiB/100MiB(10%) CN:4 DL:2MiB ETA:45s]`.
pub fn parse_progress_line(line: &str) -> ProgressUpdate {
    if !(line.contains("[#") && line.contains("DL:")) {
        return ProgressUpdate::default();
    }

    ProgressUpdate {
        percent: capture_percent(&SEGMENT_PERCENT, line),
        speed: capture(&SEGMENT_SPEED, line),
        eta: capture(&SEGMENT_ETA, line),
    }
}

/// Parse one progress-bar line from the Hugging Face CLI
///
/// e.g. `model.safetensors:  45%|████▌     | 2.1G/4.6G [00:30<00:35, 70.2MB/s]`
pub fn parse_transfer_line(line: &str) -> ProgressUpdate {
    if !line.contains("%|") {
        return ProgressUpdate::default();
    }

    ProgressUpdate {
        percent: capture_percent(&BAR_PERCENT, line),
        speed: capture(&BAR_SPEED, line),
        eta: capture(&BAR_ETA, line),
    }
}
