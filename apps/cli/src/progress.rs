use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use momentclip_core::{
    ClipStep, Moment, MomentclipError, PipelineObserver, RenderedClip, Result, RunSummary, Stage,
    format_clip_readable,
};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn step_label(step: ClipStep) -> &'static str {
    match step {
        ClipStep::Cutting => "Cutting",
        ClipStep::Subtitling => "Transcribing and burning subtitles",
        ClipStep::Analyzing => "Analyzing with vision workflows",
        ClipStep::Rendering => "Saving",
    }
}

/// Drives spinners from pipeline progress and prints every finished clip.
pub struct CliObserver {
    out_dir: PathBuf,
    finder: String,
    spinner: Option<ProgressBar>,
    step_start: Instant,
}

impl CliObserver {
    pub fn new(out_dir: PathBuf, finder: &str) -> Self {
        Self {
            out_dir,
            finder: finder.to_string(),
            spinner: None,
            step_start: Instant::now(),
        }
    }

    fn spin(&mut self, msg: &str) {
        match &self.spinner {
            Some(pb) => pb.set_message(msg.to_string()),
            None => {
                self.step_start = Instant::now();
                self.spinner = Some(create_spinner(msg));
            }
        }
    }

    fn done(&mut self, msg: String) {
        let line = format!(
            "{} {} {}",
            style("✓").green().bold(),
            msg,
            style(format!("[{}]", format_duration(self.step_start.elapsed()))).dim()
        );
        match self.spinner.take() {
            Some(pb) => pb.finish_with_message(line),
            None => println!("{}", line),
        }
        self.step_start = Instant::now();
    }
}

impl PipelineObserver for CliObserver {
    fn on_stage(&mut self, stage: Stage) {
        match stage {
            Stage::LoadingTranscoder => self.spin("Loading ffmpeg..."),
            Stage::StagingSource => self.spin("Staging source video..."),
            Stage::FindingMoments => {
                let msg = format!("Finding key moments ({})...", self.finder);
                self.spin(&msg);
            }
            Stage::Clip { index, total, step } => {
                let msg = format!("[{}/{}] {}...", index, total, step_label(step));
                self.spin(&msg);
            }
        }
    }

    fn on_moments(&mut self, moments: &[Moment]) {
        let times = moments
            .iter()
            .map(|m| format!("{:.1}s", m.seconds))
            .collect::<Vec<_>>()
            .join(", ");
        self.done(format!(
            "Found {} key moments {}",
            moments.len(),
            style(times).dim()
        ));
    }

    fn on_subtitles_skipped(&mut self, index: usize, error: &MomentclipError) {
        let line = format!(
            "{} Short {} has no subtitles: {}",
            style("!").yellow().bold(),
            index,
            error
        );
        match &self.spinner {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn on_clip_rendered(&mut self, clip: &RenderedClip) {
        let path = self.out_dir.join(clip.spec.file_name());
        self.done(format!(
            "Saved {} (moment {:.1}s)",
            style(path.display()).cyan(),
            clip.moment.seconds
        ));
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", format_clip_readable(clip));
    }

    fn on_finish(&mut self, outcome: &Result<RunSummary>) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        if let Ok(summary) = outcome {
            if summary.clips == 0 {
                println!("{} No key moments found", style("!").yellow().bold());
            }
        }
    }
}
