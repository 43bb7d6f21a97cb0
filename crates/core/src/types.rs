use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Start timestamp (seconds) of a clip to cut.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Moment {
    pub seconds: f64,
}

impl Moment {
    pub fn new(seconds: f64) -> Self {
        Self { seconds }
    }
}

/// Geometry and timing of one clip cut from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// 1-based position in the run
    pub index: usize,
    pub start: f64,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl ClipSpec {
    pub fn file_name(&self) -> String {
        format!("short_{}.mp4", self.index)
    }

    pub fn analysis_file_name(&self) -> String {
        format!("short_{}.analysis.json", self.index)
    }
}

/// Workflow response from the vision collaborator.
///
/// Only `results[].time`, `results[].data.concepts[].value` and
/// `results[].data.regions` are interpreted. Everything else is kept so the
/// raw response can be dumped next to the clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<AnalysisEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: AnalysisData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub concepts: Vec<Concept>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub regions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub value: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisEntry {
    pub fn has_concept_above(&self, threshold: f64) -> bool {
        self.data.concepts.iter().any(|c| c.value > threshold)
    }

    pub fn has_regions(&self) -> bool {
        !self.data.regions.is_empty()
    }
}

/// The three workflow responses gathered for one clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipAnalysis {
    pub emotion_analysis: AnalysisResult,
    pub face_analysis: AnalysisResult,
    pub general_analysis: AnalysisResult,
}

/// A finished clip handed to the output sink.
#[derive(Debug, Clone)]
pub struct RenderedClip {
    pub spec: ClipSpec,
    pub moment: Moment,
    pub video: Vec<u8>,
    pub analysis: ClipAnalysis,
    /// Number of subtitle cues burned into the frame
    pub cues: usize,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
