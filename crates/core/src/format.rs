use crate::types::RenderedClip;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format seconds as an SRT `HH:MM:SS,mmm` timestamp
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Human-readable block for one rendered clip
pub fn format_clip_readable(clip: &RenderedClip) -> String {
    let mut output = String::new();
    let end = clip.spec.start + clip.spec.duration;

    output.push_str(&format!(
        "## Short {} [{}–{}]\n\n",
        clip.spec.index,
        format_timestamp(clip.spec.start),
        format_timestamp(end)
    ));
    output.push_str(&format!(
        "**Size:** {}x{} | **Subtitles:** {} cues | **Video:** {} KiB\n\n",
        clip.spec.width,
        clip.spec.height,
        clip.cues,
        clip.video.len() / 1024
    ));

    let analysis = serde_json::to_string_pretty(&clip.analysis).unwrap_or_default();
    output.push_str(&analysis);
    output.push('\n');

    output
}
