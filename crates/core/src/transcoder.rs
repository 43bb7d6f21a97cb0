//! Transcoder collaborator: ffmpeg processes working inside a private
//! scratch directory.

use std::{
    path::{Component, Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::{fs, process::Command};
use tracing::debug;

use crate::{
    error::{MomentclipError, Result},
    probe::{ffprobe_duration, parse_diagnostic_duration},
    types::ClipSpec,
};

/// A transcoder with its own file namespace.
///
/// Names passed to the file operations are bare file names inside the
/// transcoder's workspace, never host paths.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn load(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    /// Run one transform. Returns the diagnostic text the tool printed.
    async fn run(&mut self, args: &[String]) -> Result<String>;

    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    async fn unlink(&mut self, name: &str) -> Result<()>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    /// Duration of a workspace file in seconds.
    async fn probe_duration(&mut self, name: &str) -> Result<f64>;

    /// Copy a host file into the workspace.
    async fn import_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let data = fs::read(source).await?;
        self.write_file(name, &data).await
    }
}

/// The transcoder's virtual filesystem.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("momentclip-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Map a workspace file name to a host path.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.path().join(name)),
            _ => Err(MomentclipError::InvalidWorkspacePath {
                name: name.to_string(),
            }),
        }
    }

    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        fs::write(self.resolve(name)?, data).await?;
        Ok(())
    }

    pub async fn copy_from(&self, name: &str, source: &Path) -> Result<()> {
        fs::copy(source, self.resolve(name)?).await?;
        Ok(())
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(name)?).await?)
    }

    pub async fn unlink(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name)?).await?;
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.resolve(from)?, self.resolve(to)?).await?;
        Ok(())
    }
}

/// ffmpeg found on PATH, working in a [`Workspace`].
#[derive(Debug, Default)]
pub struct FfmpegTranscoder {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    workspace: Option<Workspace>,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn loaded(&self) -> Result<(&Path, &Workspace)> {
        match (&self.ffmpeg, &self.workspace) {
            (Some(ffmpeg), Some(workspace)) => Ok((ffmpeg.as_path(), workspace)),
            _ => Err(MomentclipError::TranscoderNotLoaded),
        }
    }

    /// Banner ffmpeg prints for an input, regardless of exit status.
    async fn diagnostics(&self, name: &str) -> Result<String> {
        let (ffmpeg, workspace) = self.loaded()?;
        workspace.resolve(name)?;
        let output = Command::new(ffmpeg)
            .args(["-hide_banner", "-i", name])
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn load(&mut self) -> Result<()> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MomentclipError::TranscoderNotFound)?;
        self.ffprobe = which::which("ffprobe").ok();
        self.workspace = Some(Workspace::new()?);
        self.ffmpeg = Some(ffmpeg);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded().is_ok()
    }

    async fn run(&mut self, args: &[String]) -> Result<String> {
        let (ffmpeg, workspace) = self.loaded()?;
        debug!("Running ffmpeg {}", args.join(" "));

        let output = Command::new(ffmpeg)
            .args(args)
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .output()
            .await?;

        let diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(MomentclipError::transcode_failed(
                diagnostics,
                output.status.code(),
            ));
        }

        Ok(diagnostics)
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.loaded()?.1.write(name, data).await
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.loaded()?.1.read(name).await
    }

    async fn unlink(&mut self, name: &str) -> Result<()> {
        self.loaded()?.1.unlink(name).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.loaded()?.1.rename(from, to).await
    }

    async fn import_file(&mut self, name: &str, source: &Path) -> Result<()> {
        self.loaded()?.1.copy_from(name, source).await
    }

    async fn probe_duration(&mut self, name: &str) -> Result<f64> {
        let (_, workspace) = self.loaded()?;
        let path = workspace.resolve(name)?;

        if let Some(ffprobe) = &self.ffprobe {
            if let Some(duration) = ffprobe_duration(ffprobe, &path).await {
                return Ok(duration);
            }
        }

        let diagnostics = self.diagnostics(name).await?;
        parse_diagnostic_duration(&diagnostics).ok_or_else(|| {
            MomentclipError::DurationUndeterminable {
                name: name.to_string(),
            }
        })
    }
}

/// Builder for a single-input ffmpeg command line.
#[derive(Debug, Clone)]
pub struct TranscodeArgs {
    input: String,
    output: String,
    output_args: Vec<String>,
}

impl TranscodeArgs {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            output_args: Vec::new(),
        }
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Output-side seek: decode from the start and drop frames up to `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.output_arg("-ss").output_arg(format_seconds(seconds))
    }

    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_seconds(seconds))
    }

    pub fn build(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.output_args.len() + 5);
        args.push("-y".to_string());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());
        args
    }
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{:.3}", seconds)
    }
}

/// Trim and scale one clip out of the staged source.
pub fn cut_clip_args(input: &str, spec: &ClipSpec) -> Vec<String> {
    TranscodeArgs::new(input, spec.file_name())
        .video_filter(format!("scale={}:{}", spec.width, spec.height))
        .seek(spec.start)
        .duration(spec.duration)
        .build()
}

/// 16 kHz mono PCM, accepted by both hosted and local Whisper.
pub fn extract_audio_args(video: &str, audio: &str) -> Vec<String> {
    TranscodeArgs::new(video, audio)
        .output_arg("-vn")
        .output_arg("-acodec")
        .output_arg("pcm_s16le")
        .output_arg("-ar")
        .output_arg("16000")
        .output_arg("-ac")
        .output_arg("1")
        .build()
}

pub fn burn_subtitles_args(video: &str, subtitles: &str, output: &str) -> Vec<String> {
    TranscodeArgs::new(video, output)
        .video_filter(format!("subtitles={}", subtitles))
        .build()
}
