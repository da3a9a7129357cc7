//! Video discovery
//!
//! Resolves which clip a run analyzes: an explicit path, or the first video
//! found in a list of search directories.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions recognized as videos, in discovery priority order
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "m4v"];

/// Directories searched when no explicit video is given
pub fn default_search_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("videos"), PathBuf::from(".")]
}

fn video_extension(path: &Path) -> Option<usize> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().position(|known| *known == ext)
}

/// Videos directly inside `dir`: grouped by extension priority, sorted by
/// name within each group.
pub fn list_video_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut videos: Vec<(usize, PathBuf)> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(rank) = video_extension(&path) {
            videos.push((rank, path));
        }
    }
    videos.sort();
    Ok(videos.into_iter().map(|(_, path)| path).collect())
}

/// Resolve the clip to analyze.
///
/// An explicit path must exist. Otherwise the first directory in
/// `search_dirs` that holds a video wins.
pub fn find_video_file(explicit: Option<&Path>, search_dirs: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Video file not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    for dir in search_dirs.iter().filter(|d| d.is_dir()) {
        if let Some(first) = list_video_files(dir)?.into_iter().next() {
            tracing::debug!(dir = %dir.display(), video = %first.display(), "video discovered");
            return Ok(first);
        }
    }

    let searched: Vec<String> = search_dirs.iter().map(|d| d.display().to_string()).collect();
    bail!(
        "No video found (looked for {} in: {})",
        VIDEO_EXTENSIONS.join(", "),
        searched.join(", ")
    )
}
