use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use momentclip_core::{
    ClarifaiClient, ContentDriven, DirectorySink, FfmpegTranscoder, FixedRatio, HostedTranscriber,
    MomentFinder, Pipeline, PipelineConfig, Provider, ServiceConfig, SourceVideo, SubtitlePolicy,
    Transcriber, VisionAnalyzer, resolve_source, source::is_remote, vision::validate_pat,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::progress::{CliObserver, create_spinner, format_duration};

mod progress;

/// CLI wrapper for the moment finders (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliMoments {
    /// Vision-scored moments across the whole source
    #[default]
    Content,
    /// Five moments at 10/30/50/70/90 % of the runtime
    Fixed,
}

#[derive(Clone, Default, ValueEnum)]
enum CliTranscriber {
    #[default]
    Openai,
    Groq,
    /// In-process Whisper (requires the `local-whisper` feature)
    Local,
}

#[derive(Clone, Default, ValueEnum)]
enum CliSubtitles {
    /// A clip that cannot be subtitled fails the run
    #[default]
    Required,
    /// Keep the clip without subtitles
    BestEffort,
}

impl From<CliSubtitles> for SubtitlePolicy {
    fn from(cli: CliSubtitles) -> Self {
        match cli {
            CliSubtitles::Required => SubtitlePolicy::Required,
            CliSubtitles::BestEffort => SubtitlePolicy::BestEffort,
        }
    }
}

#[derive(Parser)]
#[command(name = "momentclip")]
#[command(
    about = "Find key moments in a video, cut vertical shorts, burn subtitles and tag them with vision labels"
)]
struct Cli {
    /// Video file path or URL
    source: String,

    /// How key moments are chosen
    #[arg(short, long, default_value = "content")]
    moments: CliMoments,

    /// Speech-to-text backend for subtitles
    #[arg(short, long, default_value = "openai")]
    transcriber: CliTranscriber,

    /// What to do when a clip cannot be subtitled
    #[arg(short, long, default_value = "required")]
    subtitles: CliSubtitles,

    /// Output directory for the shorts
    #[arg(short, long, default_value = "shorts")]
    out: PathBuf,

    /// Force re-downloading even if the source is cached
    #[arg(short, long)]
    force: bool,

    /// Confidence a concept needs to mark a moment (overrides MOMENTCLIP_CONFIDENCE_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    // Spinners own the terminal, so only warnings by default
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("momentclip=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Fail before any work when a required key is missing.
fn validate_keys(transcriber: &CliTranscriber) -> Result<String> {
    match transcriber {
        CliTranscriber::Openai => {
            Provider::Openai.validate_api_key()?;
        }
        CliTranscriber::Groq => {
            Provider::Groq.validate_api_key()?;
        }
        CliTranscriber::Local => {}
    }
    Ok(validate_pat()?)
}

async fn build_transcriber(
    choice: &CliTranscriber,
    http: reqwest::Client,
) -> Result<Arc<dyn Transcriber>> {
    match choice {
        CliTranscriber::Openai => Ok(Arc::new(HostedTranscriber::from_env(http, Provider::Openai)?)),
        CliTranscriber::Groq => Ok(Arc::new(HostedTranscriber::from_env(http, Provider::Groq)?)),
        CliTranscriber::Local => local_transcriber().await,
    }
}

#[cfg(feature = "local-whisper")]
async fn local_transcriber() -> Result<Arc<dyn Transcriber>> {
    let spinner = create_spinner("Checking Whisper model...");
    let model_path = momentclip_core::ensure_model(&momentclip_core::get_root_cache_dir()).await;
    spinner.finish_and_clear();
    println!("{} Whisper model ready", style("✓").green().bold());
    Ok(Arc::new(momentclip_core::LocalWhisper::new(model_path?)))
}

#[cfg(not(feature = "local-whisper"))]
async fn local_transcriber() -> Result<Arc<dyn Transcriber>> {
    anyhow::bail!("local transcription needs a build with `--features local-whisper`")
}

async fn acquire_source(input: &str, force: bool) -> Result<SourceVideo> {
    let step_start = Instant::now();
    let spinner = is_remote(input).then(|| create_spinner("Downloading video..."));
    let resolved = resolve_source(input, force).await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let source = resolved?;

    let name = source
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());
    let note = if source.cached {
        "(cached)".to_string()
    } else if is_remote(input) {
        format!("[{}]", format_duration(step_start.elapsed()))
    } else {
        "(local)".to_string()
    };
    println!(
        "{} Source: {} {}",
        style("✓").green().bold(),
        style(name).dim(),
        style(note).dim()
    );
    Ok(source)
}

async fn run(cli: Cli) -> Result<()> {
    let pat = validate_keys(&cli.transcriber)?;

    let service = ServiceConfig::from_env();
    let threshold = cli.threshold.unwrap_or(service.confidence_threshold);
    let http = service.http_client()?;

    println!(
        "\n{}  {}\n",
        style("momentclip").cyan().bold(),
        style("Key Moment Shorts").dim()
    );

    let transcriber = build_transcriber(&cli.transcriber, http.clone()).await?;
    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let source = acquire_source(&cli.source, cli.force).await?;

    let analyzer: Arc<dyn VisionAnalyzer> = Arc::new(ClarifaiClient::new(http, pat, service));
    let finder: Box<dyn MomentFinder> = match cli.moments {
        CliMoments::Content => {
            Box::new(ContentDriven::new(analyzer.clone()).with_threshold(threshold))
        }
        CliMoments::Fixed => Box::new(FixedRatio),
    };
    let config = PipelineConfig {
        subtitles: cli.subtitles.into(),
        ..PipelineConfig::default()
    };

    let mut pipeline = Pipeline::new(
        Box::new(FfmpegTranscoder::new()),
        finder,
        transcriber,
        analyzer,
        config,
    );
    tracing::info!(
        finder = pipeline.finder_name(),
        transcriber = pipeline.transcriber_name(),
        "Starting run"
    );

    let mut sink = DirectorySink::new(&cli.out);
    let mut observer = CliObserver::new(cli.out.clone(), pipeline.finder_name());
    let summary = pipeline.run(&source, &mut sink, &mut observer).await?;

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!(
        "{} {} shorts in {}\n",
        style("Saved:").dim(),
        summary.clips,
        style(sink.dir().display()).cyan()
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}
