//! The clip pipeline: find moments, then cut, subtitle, analyze and render
//! one clip at a time.

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    config::{PipelineConfig, SubtitlePolicy},
    error::{MomentclipError, Result},
    moments::{MomentFinder, SourceContext},
    sink::ClipSink,
    source::SourceVideo,
    subtitles::overlay_subtitles,
    transcoder::{Transcoder, cut_clip_args},
    transcribe::Transcriber,
    types::{ClipSpec, Moment, RenderedClip},
    vision::{MediaInput, VisionAnalyzer, analyze_all},
};

/// Workspace name the source is staged under.
pub const INPUT_FILE: &str = "input.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStep {
    Cutting,
    Subtitling,
    Analyzing,
    Rendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadingTranscoder,
    StagingSource,
    FindingMoments,
    Clip {
        index: usize,
        total: usize,
        step: ClipStep,
    },
}

/// Progress hooks for whatever surface drives the pipeline.
///
/// `on_finish` is called exactly once per run, whether it failed or not.
pub trait PipelineObserver: Send {
    fn on_start(&mut self) {}
    fn on_stage(&mut self, _stage: Stage) {}
    fn on_moments(&mut self, _moments: &[Moment]) {}
    fn on_subtitles_skipped(&mut self, _index: usize, _error: &MomentclipError) {}
    fn on_clip_rendered(&mut self, _clip: &RenderedClip) {}
    fn on_finish(&mut self, _outcome: &Result<RunSummary>) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub moments: Vec<Moment>,
    pub clips: usize,
}

pub struct Pipeline {
    transcoder: Box<dyn Transcoder>,
    finder: Box<dyn MomentFinder>,
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn VisionAnalyzer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        transcoder: Box<dyn Transcoder>,
        finder: Box<dyn MomentFinder>,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn VisionAnalyzer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            transcoder,
            finder,
            transcriber,
            analyzer,
            config,
        }
    }

    pub fn finder_name(&self) -> &'static str {
        self.finder.name()
    }

    pub fn transcriber_name(&self) -> &str {
        self.transcriber.name()
    }

    /// Process one source video end to end.
    ///
    /// Clips are produced strictly one after another. The first failure
    /// aborts the run; clips already handed to `sink` stay there.
    pub async fn run(
        &mut self,
        source: &SourceVideo,
        sink: &mut dyn ClipSink,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunSummary> {
        let span = info_span!("run", run_id = %Uuid::new_v4(), finder = self.finder.name());

        observer.on_start();
        let outcome = self.execute(source, sink, observer).instrument(span).await;
        observer.on_finish(&outcome);
        outcome
    }

    async fn execute(
        &mut self,
        source: &SourceVideo,
        sink: &mut dyn ClipSink,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunSummary> {
        if !self.transcoder.is_loaded() {
            observer.on_stage(Stage::LoadingTranscoder);
            self.transcoder.load().await?;
        }

        observer.on_stage(Stage::StagingSource);
        self.transcoder.import_file(INPUT_FILE, &source.path).await?;

        observer.on_stage(Stage::FindingMoments);
        let context = SourceContext {
            input: INPUT_FILE,
            remote_url: source.remote_url.as_deref(),
        };
        let moments = self
            .finder
            .find_moments(self.transcoder.as_mut(), context)
            .await?;
        observer.on_moments(&moments);

        sink.prepare().await?;

        let total = moments.len();
        for (i, moment) in moments.iter().enumerate() {
            let spec = ClipSpec {
                index: i + 1,
                start: moment.seconds,
                duration: self.config.clip_duration,
                width: self.config.clip_width,
                height: self.config.clip_height,
            };
            let clip = self.produce_clip(spec, *moment, total, observer).await?;

            observer.on_stage(Stage::Clip {
                index: clip.spec.index,
                total,
                step: ClipStep::Rendering,
            });
            sink.render(&clip).await?;
            observer.on_clip_rendered(&clip);
        }

        info!("Produced {} clips", total);
        Ok(RunSummary {
            moments,
            clips: total,
        })
    }

    async fn produce_clip(
        &mut self,
        spec: ClipSpec,
        moment: Moment,
        total: usize,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RenderedClip> {
        let index = spec.index;
        let name = spec.file_name();
        let stage = |step| Stage::Clip { index, total, step };

        observer.on_stage(stage(ClipStep::Cutting));
        info!("Cutting {} at {:.2}s", name, spec.start);
        self.transcoder
            .run(&cut_clip_args(INPUT_FILE, &spec))
            .await?;

        observer.on_stage(stage(ClipStep::Subtitling));
        let subtitled = overlay_subtitles(
            self.transcoder.as_mut(),
            self.transcriber.as_ref(),
            &name,
        )
        .await;
        let cues = match (subtitled, self.config.subtitles) {
            (Ok(cues), _) => cues,
            (Err(e), SubtitlePolicy::BestEffort) => {
                warn!("Subtitles failed for {}: {}", name, e);
                observer.on_subtitles_skipped(index, &e);
                0
            }
            (Err(e), SubtitlePolicy::Required) => return Err(e),
        };

        observer.on_stage(stage(ClipStep::Analyzing));
        let video = self.transcoder.read_file(&name).await?;
        let analysis = analyze_all(self.analyzer.as_ref(), &MediaInput::Video(&video)).await?;
        self.transcoder.unlink(&name).await?;

        Ok(RenderedClip {
            spec,
            moment,
            video,
            analysis,
            cues,
        })
    }
}
