//! Momentclip Core Library
//!
//! Finds key moments in a video, cuts vertical shorts around them, burns in
//! placeholder subtitles and tags every short with vision-analysis labels.

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod moments;
pub mod pipeline;
pub mod probe;
pub mod provider;
pub mod sink;
pub mod source;
pub mod subtitles;
pub mod transcoder;
pub mod transcribe;
pub mod types;
pub mod vision;

// Re-export commonly used items at crate root
pub use cache::{find_video_in_cache, get_cache_dir, get_root_cache_dir};
pub use config::{PipelineConfig, ServiceConfig, SubtitlePolicy};
pub use error::{MomentclipError, Result};
pub use format::{format_clip_readable, format_srt_timestamp, format_timestamp};
pub use moments::{
    ContentDriven, FixedRatio, MomentFinder, SourceContext, fixed_ratio_moments,
    select_key_moments,
};
pub use pipeline::{
    ClipStep, INPUT_FILE, NoopObserver, Pipeline, PipelineObserver, RunSummary, Stage,
};
pub use provider::{Provider, ProviderConfig};
pub use sink::{ClipSink, DirectorySink};
pub use source::{SourceVideo, direct_media_url, download_video, resolve_source};
pub use subtitles::{Cue, overlay_subtitles, segment_transcript, to_srt};
pub use transcoder::{FfmpegTranscoder, TranscodeArgs, Transcoder, Workspace};
pub use transcribe::{HostedTranscriber, Transcriber};
pub use types::{
    AnalysisData, AnalysisEntry, AnalysisResult, ClipAnalysis, ClipSpec, Concept, Moment,
    RenderedClip,
};
pub use vision::{ClarifaiClient, MediaInput, VisionAnalyzer, Workflow, analyze_all};

#[cfg(feature = "local-whisper")]
pub use transcribe::{LocalWhisper, ensure_model};
