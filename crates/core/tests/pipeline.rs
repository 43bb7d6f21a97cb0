use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use momentclip_core::{
    AnalysisResult, ContentDriven, DirectorySink, FixedRatio, MediaInput,
    MomentclipError, Pipeline, PipelineConfig, PipelineObserver, RenderedClip, Result,
    RunSummary, SourceVideo, Stage, SubtitlePolicy, Transcoder, Transcriber, VisionAnalyzer,
    Workflow, direct_media_url,
};
use serde_json::json;
use tempfile::TempDir;

type Log<T> = Arc<Mutex<Vec<T>>>;

/// In-memory transcoder that fakes ffmpeg outputs from the argument list.
struct FakeTranscoder {
    loaded: bool,
    files: HashMap<String, Vec<u8>>,
    duration: Option<f64>,
    fail_output: Option<String>,
    runs: Log<Vec<String>>,
}

impl FakeTranscoder {
    fn new(duration: Option<f64>) -> (Self, Log<Vec<String>>) {
        let runs = Log::default();
        let transcoder = Self {
            loaded: false,
            files: HashMap::new(),
            duration,
            fail_output: None,
            runs: runs.clone(),
        };
        (transcoder, runs)
    }

    fn failing_on(mut self, output: &str) -> Self {
        self.fail_output = Some(output.to_string());
        self
    }

    fn missing(name: &str) -> MomentclipError {
        MomentclipError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            name.to_string(),
        ))
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn load(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    async fn run(&mut self, args: &[String]) -> Result<String> {
        self.runs.lock().unwrap().push(args.to_vec());

        let input = value_after(args, "-i").unwrap_or_default().to_string();
        let output = args.last().cloned().unwrap_or_default();
        if self.fail_output.as_deref() == Some(output.as_str()) {
            return Err(MomentclipError::transcode_failed("boom", Some(1)));
        }
        let source = self.files.get(&input).cloned().ok_or_else(|| Self::missing(&input))?;

        let produced = if output.ends_with(".wav") {
            b"wav".to_vec()
        } else if value_after(args, "-vf").is_some_and(|f| f.starts_with("subtitles=")) {
            let mut burned = source;
            burned.extend_from_slice(b"+subs");
            burned
        } else {
            format!("clip@{}", value_after(args, "-ss").unwrap_or("?")).into_bytes()
        };
        self.files.insert(output, produced);
        Ok(String::new())
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.files.get(name).cloned().ok_or_else(|| Self::missing(name))
    }

    async fn unlink(&mut self, name: &str) -> Result<()> {
        self.files.remove(name).map(|_| ()).ok_or_else(|| Self::missing(name))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let data = self.files.remove(from).ok_or_else(|| Self::missing(from))?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    async fn probe_duration(&mut self, name: &str) -> Result<f64> {
        self.duration
            .ok_or_else(|| MomentclipError::DurationUndeterminable {
                name: name.to_string(),
            })
    }
}

struct FakeTranscriber {
    text: std::result::Result<String, String>,
    calls: Log<usize>,
}

impl FakeTranscriber {
    fn saying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Ok(text.to_string()),
            calls: Log::default(),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: Err("503 Service Unavailable".to_string()),
            calls: Log::default(),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcribe(&self, audio: Vec<u8>, _file_name: &str) -> Result<String> {
        self.calls.lock().unwrap().push(audio.len());
        self.text
            .clone()
            .map_err(|reason| MomentclipError::transcription_failed("fake", reason))
    }
}

#[derive(Default)]
struct FakeVision {
    responses: HashMap<&'static str, serde_json::Value>,
    fail_on: Option<Workflow>,
    calls: Log<(Workflow, String)>,
}

impl FakeVision {
    fn respond(mut self, workflow: Workflow, body: serde_json::Value) -> Self {
        self.responses.insert(workflow.name(), body);
        self
    }
}

#[async_trait]
impl VisionAnalyzer for FakeVision {
    async fn analyze(&self, media: &MediaInput<'_>, workflow: Workflow) -> Result<AnalysisResult> {
        let described = match media {
            MediaInput::Url(url) => format!("url:{url}"),
            MediaInput::Video(bytes) => format!("video:{}", String::from_utf8_lossy(bytes)),
        };
        self.calls.lock().unwrap().push((workflow, described));

        if self.fail_on == Some(workflow) {
            return Err(MomentclipError::VisionFailed {
                workflow: workflow.name().to_string(),
                status: 500,
                reason: "Internal Server Error".to_string(),
            });
        }
        let body = self
            .responses
            .get(workflow.name())
            .cloned()
            .unwrap_or_else(|| json!({ "results": [] }));
        Ok(serde_json::from_value(body)?)
    }
}

#[derive(Default)]
struct RecordingObserver {
    started: usize,
    finished: Vec<bool>,
    stages: Vec<Stage>,
    rendered: Vec<usize>,
    skipped: Vec<usize>,
}

impl PipelineObserver for RecordingObserver {
    fn on_start(&mut self) {
        self.started += 1;
    }

    fn on_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    fn on_subtitles_skipped(&mut self, index: usize, _error: &MomentclipError) {
        self.skipped.push(index);
    }

    fn on_clip_rendered(&mut self, clip: &RenderedClip) {
        self.rendered.push(clip.spec.index);
    }

    fn on_finish(&mut self, outcome: &Result<RunSummary>) {
        self.finished.push(outcome.is_ok());
    }
}

struct Harness {
    _dir: TempDir,
    source: SourceVideo,
    out: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp4");
        std::fs::write(&path, b"source-video").unwrap();
        let out = dir.path().join("shorts");
        Self {
            source: SourceVideo {
                path,
                remote_url: None,
                cached: false,
            },
            out,
            _dir: dir,
        }
    }

    fn shorts(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".mp4"))
            .collect();
        names.sort();
        names
    }

    fn read(&self, name: &str) -> String {
        String::from_utf8(std::fs::read(self.out.join(name)).unwrap()).unwrap()
    }
}

fn confident(time: f64) -> serde_json::Value {
    json!({ "time": time, "data": { "concepts": [{ "name": "joy", "value": 0.97 }] } })
}

#[tokio::test]
async fn fixed_ratio_produces_five_subtitled_clips() {
    let harness = Harness::new();
    let (transcoder, runs) = FakeTranscoder::new(Some(100.0));
    let transcriber = FakeTranscriber::saying("A. B. C.");
    let vision = Arc::new(FakeVision::default());

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        transcriber.clone(),
        vision.clone(),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let summary = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap();

    let starts: Vec<f64> = summary.moments.iter().map(|m| m.seconds).collect();
    assert_eq!(starts, vec![10.0, 30.0, 50.0, 70.0, 90.0]);
    assert_eq!(summary.clips, 5);
    assert_eq!(
        harness.shorts(),
        vec!["short_1.mp4", "short_2.mp4", "short_3.mp4", "short_4.mp4", "short_5.mp4"]
    );
    assert_eq!(harness.read("short_1.mp4"), "clip@10+subs");
    assert_eq!(harness.read("short_5.mp4"), "clip@90+subs");
    assert!(harness.out.join("short_3.analysis.json").exists());

    // cut, extract audio, burn subtitles for each clip, in that order
    let runs = runs.lock().unwrap();
    assert_eq!(runs.len(), 15);
    assert_eq!(runs[0].last().map(String::as_str), Some("short_1.mp4"));
    assert_eq!(runs[1].last().map(String::as_str), Some("audio.wav"));
    assert_eq!(
        runs[2].last().map(String::as_str),
        Some("output_with_subtitles.mp4")
    );

    assert_eq!(transcriber.calls.lock().unwrap().len(), 5);
    // three workflows per clip, no whole-source analysis for fixed ratios
    assert_eq!(vision.calls.lock().unwrap().len(), 15);
    assert_eq!(observer.started, 1);
    assert_eq!(observer.finished, vec![true]);
    assert_eq!(observer.rendered, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn content_driven_produces_one_clip_per_moment() {
    let harness = Harness::new();
    let (transcoder, _runs) = FakeTranscoder::new(Some(60.0));
    let vision = Arc::new(
        FakeVision::default()
            .respond(
                Workflow::Emotion,
                json!({ "results": [confident(20.0), confident(5.0)] }),
            )
            .respond(
                Workflow::FaceDetection,
                json!({ "results": [{ "time": 5.0, "data": { "regions": [{ "id": "f" }] } }] }),
            )
            .respond(
                Workflow::General,
                json!({ "results": [confident(75.0)] }),
            ),
    );

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(ContentDriven::new(vision.clone())),
        FakeTranscriber::saying("Hello there"),
        vision.clone(),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let summary = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap();

    // 75s lies past the 60s runtime
    let starts: Vec<f64> = summary.moments.iter().map(|m| m.seconds).collect();
    assert_eq!(starts, vec![5.0, 20.0]);
    assert_eq!(harness.shorts(), vec!["short_1.mp4", "short_2.mp4"]);
    assert_eq!(harness.read("short_2.mp4"), "clip@20+subs");

    let calls = vision.calls.lock().unwrap();
    assert_eq!(calls.len(), 9);
    assert_eq!(calls[0], (Workflow::Emotion, "video:source-video".to_string()));
    assert_eq!(calls[3].1, "video:clip@5+subs");
}

#[tokio::test]
async fn direct_media_urls_are_analyzed_by_url() {
    let mut harness = Harness::new();
    harness.source.remote_url = direct_media_url("https://cdn.example/talk.mp4");
    let (transcoder, _runs) = FakeTranscoder::new(Some(60.0));
    let vision = Arc::new(FakeVision::default());

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(ContentDriven::new(vision.clone())),
        FakeTranscriber::saying(""),
        vision.clone(),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);

    pipeline
        .run(&harness.source, &mut sink, &mut RecordingObserver::default())
        .await
        .unwrap();

    // nothing qualified, so only the whole-source analysis ran
    let calls = vision.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(
        calls
            .iter()
            .all(|(_, media)| media == "url:https://cdn.example/talk.mp4")
    );
}

#[tokio::test]
async fn page_urls_are_analyzed_from_downloaded_bytes() {
    let mut harness = Harness::new();
    harness.source.remote_url = direct_media_url("https://www.youtube.com/watch?v=abc123");
    let (transcoder, _runs) = FakeTranscoder::new(Some(60.0));
    let vision = Arc::new(FakeVision::default());

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(ContentDriven::new(vision.clone())),
        FakeTranscriber::saying(""),
        vision.clone(),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);

    pipeline
        .run(&harness.source, &mut sink, &mut RecordingObserver::default())
        .await
        .unwrap();

    let calls = vision.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, media)| media == "video:source-video"));
}

#[tokio::test]
async fn vision_failure_rejects_before_any_clip_and_still_finishes() {
    let harness = Harness::new();
    let (transcoder, runs) = FakeTranscoder::new(Some(60.0));
    let vision = Arc::new(FakeVision {
        fail_on: Some(Workflow::FaceDetection),
        ..FakeVision::default()
    });

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(ContentDriven::new(vision.clone())),
        FakeTranscriber::saying("A. B."),
        vision,
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let err = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap_err();

    assert!(matches!(err, MomentclipError::VisionFailed { status: 500, .. }));
    assert!(runs.lock().unwrap().is_empty());
    assert!(!harness.out.exists());
    assert_eq!(observer.finished, vec![false]);
    assert!(observer.rendered.is_empty());
}

#[tokio::test]
async fn zero_moments_leave_an_empty_but_prepared_output() {
    let harness = Harness::new();
    let (transcoder, runs) = FakeTranscoder::new(Some(60.0));
    let vision = Arc::new(FakeVision::default());

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(ContentDriven::new(vision.clone())),
        FakeTranscriber::saying("unused"),
        vision,
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let summary = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap();

    assert_eq!(summary.clips, 0);
    assert!(harness.out.is_dir());
    assert!(harness.shorts().is_empty());
    assert!(runs.lock().unwrap().is_empty());
    assert_eq!(observer.finished, vec![true]);
}

#[tokio::test]
async fn undeterminable_duration_fails_fixed_ratio_runs() {
    let harness = Harness::new();
    let (transcoder, _runs) = FakeTranscoder::new(None);

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::saying("A."),
        Arc::new(FakeVision::default()),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let err = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap_err();

    assert!(matches!(err, MomentclipError::DurationUndeterminable { .. }));
    assert_eq!(observer.finished, vec![false]);
}

#[tokio::test]
async fn failing_clip_stops_the_run_and_keeps_earlier_clips() {
    let harness = Harness::new();
    let (transcoder, runs) = FakeTranscoder::new(Some(100.0));
    let transcoder = transcoder.failing_on("short_3.mp4");

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::saying("One. Two"),
        Arc::new(FakeVision::default()),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let err = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap_err();

    assert!(matches!(err, MomentclipError::TranscodeFailed { .. }));
    assert_eq!(harness.shorts(), vec!["short_1.mp4", "short_2.mp4"]);
    assert_eq!(observer.rendered, vec![1, 2]);
    assert_eq!(observer.finished, vec![false]);
    // nothing was attempted after the failing cut
    assert_eq!(
        runs.lock().unwrap().last().and_then(|r| r.last()).map(String::as_str),
        Some("short_3.mp4")
    );
}

#[tokio::test]
async fn transcription_failure_is_fatal_when_subtitles_are_required() {
    let harness = Harness::new();
    let (transcoder, _runs) = FakeTranscoder::new(Some(100.0));

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::failing(),
        Arc::new(FakeVision::default()),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let err = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap_err();

    assert!(matches!(err, MomentclipError::TranscriptionFailed { .. }));
    assert!(harness.shorts().is_empty());
    assert_eq!(observer.finished, vec![false]);
}

#[tokio::test]
async fn best_effort_subtitles_keep_clips_without_captions() {
    let harness = Harness::new();
    let (transcoder, _runs) = FakeTranscoder::new(Some(100.0));
    let config = PipelineConfig {
        subtitles: SubtitlePolicy::BestEffort,
        ..PipelineConfig::default()
    };

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::failing(),
        Arc::new(FakeVision::default()),
        config,
    );
    let mut sink = DirectorySink::new(&harness.out);
    let mut observer = RecordingObserver::default();

    let summary = pipeline
        .run(&harness.source, &mut sink, &mut observer)
        .await
        .unwrap();

    assert_eq!(summary.clips, 5);
    assert_eq!(harness.read("short_1.mp4"), "clip@10");
    assert_eq!(observer.skipped, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn empty_transcript_skips_the_burn_step() {
    let harness = Harness::new();
    let (transcoder, runs) = FakeTranscoder::new(Some(10.0));

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::saying("   "),
        Arc::new(FakeVision::default()),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);

    pipeline
        .run(&harness.source, &mut sink, &mut RecordingObserver::default())
        .await
        .unwrap();

    assert_eq!(harness.read("short_1.mp4"), "clip@1");
    let runs = runs.lock().unwrap();
    assert!(
        runs.iter()
            .all(|args| args.last().map(String::as_str) != Some("output_with_subtitles.mp4"))
    );
}

#[tokio::test]
async fn sink_is_only_prepared_after_moments_are_known() {
    let harness = Harness::new();
    std::fs::create_dir_all(&harness.out).unwrap();
    std::fs::write(harness.out.join("short_9.mp4"), b"stale").unwrap();
    let (transcoder, _runs) = FakeTranscoder::new(None);

    let mut pipeline = Pipeline::new(
        Box::new(transcoder),
        Box::new(FixedRatio),
        FakeTranscriber::saying(""),
        Arc::new(FakeVision::default()),
        PipelineConfig::default(),
    );
    let mut sink = DirectorySink::new(&harness.out);

    assert!(
        pipeline
            .run(&harness.source, &mut sink, &mut RecordingObserver::default())
            .await
            .is_err()
    );
    // the previous run's output survives a run that never got to clipping
    assert_eq!(harness.shorts(), vec!["short_9.mp4"]);
    assert!(sink.written().is_empty());
}
