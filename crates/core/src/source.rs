//! Getting the source video onto local disk.

use std::path::{Path, PathBuf};

use tokio::{fs, process::Command};
use tracing::info;

use crate::{
    cache::{find_video_in_cache, get_cache_dir},
    error::{MomentclipError, Result},
};

/// A source video on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVideo {
    pub path: PathBuf,
    /// URL of the video file itself, set only when the input pointed
    /// straight at media a remote service can fetch
    pub remote_url: Option<String>,
    pub cached: bool,
}

const MEDIA_EXTENSIONS: [&str; 6] = ["mp4", "m4v", "mov", "webm", "mkv", "avi"];

pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// The input itself when it is an http(s) URL ending in a video file name.
///
/// Page URLs (a YouTube watch link, say) only make sense to yt-dlp, so they
/// yield `None` and the downloaded bytes are used instead.
pub fn direct_media_url(input: &str) -> Option<String> {
    if !is_remote(input) {
        return None;
    }
    let path = input.split(['?', '#']).next().unwrap_or(input);
    let (_, file_name) = path.rsplit_once('/')?;
    let (_, ext) = file_name.rsplit_once('.')?;
    MEDIA_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then(|| input.to_string())
}

/// Resolve a CLI input into a local file, downloading URLs into the cache.
pub async fn resolve_source(input: &str, force: bool) -> Result<SourceVideo> {
    if !is_remote(input) {
        let path = PathBuf::from(input);
        if !path.is_file() {
            return Err(MomentclipError::SourceNotFound(path));
        }
        return Ok(SourceVideo {
            path,
            remote_url: None,
            cached: false,
        });
    }

    let cache_dir = get_cache_dir(input);
    fs::create_dir_all(&cache_dir).await?;

    if !force {
        if let Some(path) = find_video_in_cache(&cache_dir) {
            info!("Using cached download {}", path.display());
            return Ok(SourceVideo {
                path,
                remote_url: direct_media_url(input),
                cached: true,
            });
        }
    }

    let path = download_video(input, &cache_dir).await?;
    Ok(SourceVideo {
        path,
        remote_url: direct_media_url(input),
        cached: false,
    })
}

/// Download a video from URL using yt-dlp
pub async fn download_video(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    which::which("yt-dlp").map_err(|_| MomentclipError::DownloadFailed {
        url: url.to_string(),
        reason: "yt-dlp not found in PATH".to_string(),
    })?;

    let output_template = cache_dir.join("video.%(ext)s");
    let output = Command::new("yt-dlp")
        .arg(url)
        .arg("--print")
        .arg("after_move:filepath")
        .arg("-f")
        .arg("best[ext=mp4]/best")
        .arg("-o")
        .arg(&output_template)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MomentclipError::DownloadFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
    let filepath = stdout_str.trim();
    info!("Downloaded {} to {}", url, filepath);
    Ok(PathBuf::from(filepath))
}
