//! Placeholder subtitles: the transcript is cut on ". " and every cue gets a
//! fixed two-second window. Nothing here is aligned to the audio.

use tracing::info;

use crate::{
    config::CUE_SECONDS,
    error::Result,
    format::format_srt_timestamp,
    transcoder::{Transcoder, burn_subtitles_args, extract_audio_args},
    transcribe::Transcriber,
};

pub const AUDIO_FILE: &str = "audio.wav";
pub const SUBTITLE_FILE: &str = "subtitles.srt";
pub const SUBTITLED_FILE: &str = "output_with_subtitles.mp4";

#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// 1-based, as written to SRT
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Split a transcript on the literal ". " and lay cues out back to back.
///
/// Segments that are blank after trimming are dropped before windows are
/// assigned, so cue `i` always covers `[2i, 2i + 2)`.
pub fn segment_transcript(transcript: &str) -> Vec<Cue> {
    transcript
        .split(". ")
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| Cue {
            index: i + 1,
            start: i as f64 * CUE_SECONDS,
            end: (i + 1) as f64 * CUE_SECONDS,
            text: line.to_string(),
        })
        .collect()
}

pub fn to_srt(cues: &[Cue]) -> String {
    let mut output = String::new();
    for cue in cues {
        output.push_str(&format!("{}\n", cue.index));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end)
        ));
        output.push_str(&format!("{}\n\n", cue.text));
    }
    output
}

/// Transcribe a workspace clip and burn the captions into it in place.
///
/// Returns the number of cues burned. An empty transcript leaves the clip
/// untouched.
pub async fn overlay_subtitles(
    transcoder: &mut dyn Transcoder,
    transcriber: &dyn Transcriber,
    clip: &str,
) -> Result<usize> {
    transcoder.run(&extract_audio_args(clip, AUDIO_FILE)).await?;
    let audio = transcoder.read_file(AUDIO_FILE).await?;
    transcoder.unlink(AUDIO_FILE).await?;

    let transcript = transcriber.transcribe(audio, AUDIO_FILE).await?;
    let cues = segment_transcript(&transcript);
    if cues.is_empty() {
        info!("No speech in {}, skipping subtitles", clip);
        return Ok(0);
    }

    transcoder
        .write_file(SUBTITLE_FILE, to_srt(&cues).as_bytes())
        .await?;
    transcoder
        .run(&burn_subtitles_args(clip, SUBTITLE_FILE, SUBTITLED_FILE))
        .await?;

    transcoder.unlink(clip).await?;
    transcoder.rename(SUBTITLED_FILE, clip).await?;
    transcoder.unlink(SUBTITLE_FILE).await?;

    info!("Burned {} subtitle cues into {}", cues.len(), clip);
    Ok(cues.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(cues: &[Cue]) -> Vec<(f64, f64)> {
        cues.iter().map(|c| (c.start, c.end)).collect()
    }

    #[test]
    fn test_three_sentences() {
        let cues = segment_transcript("A. B. C.");
        assert_eq!(cues.len(), 3);
        assert_eq!(windows(&cues), vec![(0.0, 2.0), (2.0, 4.0), (4.0, 6.0)]);
        assert_eq!(cues[0].text, "A");
        assert_eq!(cues[2].text, "C.");
    }

    #[test]
    fn test_trailing_separator_does_not_add_a_cue() {
        let cues = segment_transcript("Hello there. General Kenobi. ");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].text, "General Kenobi");
    }

    #[test]
    fn test_not_real_sentence_boundaries() {
        // "3.5" and "!" do not split; only the literal ". " does
        let cues = segment_transcript("Version 3.5 is out! Try it. Now");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Version 3.5 is out! Try it");
    }

    #[test]
    fn test_empty_transcript() {
        assert!(segment_transcript("").is_empty());
        assert!(segment_transcript("   ").is_empty());
    }

    #[test]
    fn test_indices_stay_contiguous_after_dropping_blanks() {
        let cues = segment_transcript("One. . Two");
        assert_eq!(cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(windows(&cues), vec![(0.0, 2.0), (2.0, 4.0)]);
    }

    #[test]
    fn test_to_srt() {
        let srt = to_srt(&segment_transcript("First. Second"));
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,000\nFirst\n\n\
             2\n00:00:02,000 --> 00:00:04,000\nSecond\n\n"
        );
    }

    #[test]
    fn test_to_srt_pads_late_cues() {
        let transcript = vec!["x"; 40].join(". ");
        let srt = to_srt(&segment_transcript(&transcript));
        assert!(srt.contains("40\n00:01:18,000 --> 00:01:20,000\nx\n"));
    }
}
