//! Where finished clips end up.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::{error::Result, types::RenderedClip};

#[async_trait]
pub trait ClipSink: Send {
    /// Clear previous output and make the container ready. Called once per
    /// run, even when no moments were found.
    async fn prepare(&mut self) -> Result<()>;

    async fn render(&mut self, clip: &RenderedClip) -> Result<()>;
}

/// Writes `short_{n}.mp4` and `short_{n}.analysis.json` into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Video files written so far, in render order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn is_stale_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("short_") && (n.ends_with(".mp4") || n.ends_with(".json")))
}

#[async_trait]
impl ClipSink for DirectorySink {
    async fn prepare(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_stale_artifact(&path) {
                fs::remove_file(&path).await?;
            }
        }

        self.written.clear();
        Ok(())
    }

    async fn render(&mut self, clip: &RenderedClip) -> Result<()> {
        let video_path = self.dir.join(clip.spec.file_name());
        let analysis_path = self.dir.join(clip.spec.analysis_file_name());

        fs::write(&video_path, &clip.video).await?;
        let pretty_json = serde_json::to_string_pretty(&clip.analysis)?;
        fs::write(&analysis_path, &pretty_json).await?;

        info!("Saved {}", video_path.display());
        self.written.push(video_path);
        Ok(())
    }
}
