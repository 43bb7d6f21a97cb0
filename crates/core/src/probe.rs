//! Source duration discovery.
//!
//! ffprobe metadata is the primary source. When it is unavailable the
//! `Duration: HH:MM:SS.ff` line of ffmpeg's banner is scraped instead.

use std::{path::Path, process::Stdio, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid duration regex")
});

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Read `format.duration` out of `ffprobe -print_format json -show_format`.
pub fn parse_ffprobe_duration(stdout: &[u8]) -> Option<f64> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout).ok()?;
    probe
        .format?
        .duration?
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Scrape the first `Duration: HH:MM:SS(.frac)` out of ffmpeg diagnostics.
pub fn parse_diagnostic_duration(text: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(text)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total > 0.0).then_some(total)
}

/// Run ffprobe against a file and return its container duration.
///
/// Any failure, including ffprobe not starting at all, yields `None` so the
/// caller can fall back to the banner.
pub async fn ffprobe_duration(ffprobe: &Path, path: &Path) -> Option<f64> {
    let output = match Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("Could not run {}: {}", ffprobe.display(), e);
            return None;
        }
    };

    if !output.status.success() {
        debug!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }

    parse_ffprobe_duration(&output.stdout)
}
