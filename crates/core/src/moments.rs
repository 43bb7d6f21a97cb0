//! Key-moment selection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    config::{CONFIDENCE_THRESHOLD, FIXED_RATIOS},
    error::{MomentclipError, Result},
    transcoder::Transcoder,
    types::{AnalysisResult, Moment},
    vision::{MediaInput, VisionAnalyzer, analyze_all},
};

/// Where the staged source lives and how the vision service can reach it.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// Workspace file name of the staged source
    pub input: &'a str,
    /// URL of the video file itself, when the vision service can fetch it
    pub remote_url: Option<&'a str>,
}

#[async_trait]
pub trait MomentFinder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn find_moments(
        &self,
        transcoder: &mut dyn Transcoder,
        source: SourceContext<'_>,
    ) -> Result<Vec<Moment>>;
}

/// Pick every time at which any workflow is confident about something.
///
/// Emotion and general entries qualify with a concept above `threshold`,
/// face entries with at least one region. Times are deduplicated and sorted.
/// Negative or non-finite times are dropped, as are times at or past
/// `duration` when it is known.
pub fn select_key_moments(
    emotion: &AnalysisResult,
    face: &AnalysisResult,
    general: &AnalysisResult,
    threshold: f64,
    duration: Option<f64>,
) -> Vec<Moment> {
    let emotional = emotion
        .results
        .iter()
        .filter(|entry| entry.has_concept_above(threshold));
    let faces = face.results.iter().filter(|entry| entry.has_regions());
    let objects = general
        .results
        .iter()
        .filter(|entry| entry.has_concept_above(threshold));

    let mut times: Vec<f64> = emotional
        .chain(faces)
        .chain(objects)
        .filter_map(|entry| entry.time)
        .filter(|t| t.is_finite() && *t >= 0.0)
        .filter(|t| duration.is_none_or(|d| *t < d))
        .collect();

    times.sort_by(f64::total_cmp);
    times.dedup();
    times.into_iter().map(Moment::new).collect()
}

/// Five floored moments at 10/30/50/70/90 % of `duration`.
pub fn fixed_ratio_moments(duration: f64) -> Result<Vec<Moment>> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(MomentclipError::InvalidDuration(duration));
    }

    Ok(FIXED_RATIOS
        .iter()
        .map(|ratio| Moment::new((duration * ratio).floor()))
        .collect())
}

/// Moments derived from vision analysis of the whole source.
pub struct ContentDriven {
    analyzer: Arc<dyn VisionAnalyzer>,
    threshold: f64,
}

impl ContentDriven {
    pub fn new(analyzer: Arc<dyn VisionAnalyzer>) -> Self {
        Self {
            analyzer,
            threshold: CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

#[async_trait]
impl MomentFinder for ContentDriven {
    fn name(&self) -> &'static str {
        "content-driven"
    }

    async fn find_moments(
        &self,
        transcoder: &mut dyn Transcoder,
        source: SourceContext<'_>,
    ) -> Result<Vec<Moment>> {
        let analysis = match source.remote_url {
            Some(url) => analyze_all(self.analyzer.as_ref(), &MediaInput::Url(url)).await?,
            None => {
                let video = transcoder.read_file(source.input).await?;
                analyze_all(self.analyzer.as_ref(), &MediaInput::Video(&video)).await?
            }
        };

        // Only used to bound the selection; analysis stands on its own.
        let duration = match transcoder.probe_duration(source.input).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                debug!("Duration unavailable, moments left unbounded: {}", e);
                None
            }
        };

        let moments = select_key_moments(
            &analysis.emotion_analysis,
            &analysis.face_analysis,
            &analysis.general_analysis,
            self.threshold,
            duration,
        );
        info!("Found {} key moments", moments.len());
        Ok(moments)
    }
}

/// Five moments spread evenly over the runtime.
#[derive(Debug, Default)]
pub struct FixedRatio;

#[async_trait]
impl MomentFinder for FixedRatio {
    fn name(&self) -> &'static str {
        "fixed-ratio"
    }

    async fn find_moments(
        &self,
        transcoder: &mut dyn Transcoder,
        source: SourceContext<'_>,
    ) -> Result<Vec<Moment>> {
        let duration = transcoder.probe_duration(source.input).await?;
        info!("Source duration {:.2}s", duration);
        fixed_ratio_moments(duration)
    }
}
