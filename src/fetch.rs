//! Fetch and archive command planning
//!
//! Translates a [`DownloadRequest`] into the exact yt-dlp invocation, and
//! the staged result into a tar invocation when more than one file came
//! out of the fetch. Planning is pure; execution happens through
//! [`crate::process::ProcessHandle`].

use crate::error::{Error, Result};
use crate::process::CommandPlan;
use crate::types::DownloadRequest;
use std::path::Path;

/// yt-dlp format selector for a video quality tier
///
/// Audio-only fetches pass no selector at all; yt-dlp picks the best audio
/// itself. Unknown tiers are rejected here, which happens inside the fetch
/// job so a bad tier surfaces as a failed download rather than a rejected
/// request.
pub fn format_for_quality(video_quality: &str) -> Result<&'static str> {
    match video_quality {
        "best" => Ok("bestvideo*+bestaudio/best"),
        "fhd" => Ok("bv*[height<=1080]+ba/b[height<=1080] / wv*+ba/w"),
        "hd" => Ok("bv*[height<=720]+ba/b[height<=720] / wv*+ba/w"),
        other => Err(Error::UnknownQuality(other.to_string())),
    }
}

/// Build the yt-dlp invocation for a request
///
/// Argument layout: the URLs first, then `-x` (audio) or `-f <format>`
/// (video), `--no-playlist` when single items were requested, and always
/// `--abort-on-error` so a multi-URL fetch stops at the first failure
/// instead of staging a partial result.
pub fn fetch_plan(
    ytdlp: &Path,
    workdir: &Path,
    request: &DownloadRequest,
) -> Result<CommandPlan> {
    let mut plan = CommandPlan::new(ytdlp.to_path_buf(), workdir.to_path_buf())
        .args(request.urls.iter().cloned());
    if request.only_audio {
        plan = plan.arg("-x");
    } else {
        plan = plan.arg("-f").arg(format_for_quality(&request.video_quality)?);
    }
    if request.ignore_playlists {
        plan = plan.arg("--no-playlist");
    }
    Ok(plan.arg("--abort-on-error"))
}

/// Build the tar invocation that bundles multiple fetched files
///
/// Creates `<archive_name>` inside the working directory from the given
/// files. No compression; the media files are already compressed.
pub fn archive_plan(
    tar: &Path,
    workdir: &Path,
    archive_name: &str,
    files: &[String],
) -> CommandPlan {
    CommandPlan::new(tar.to_path_buf(), workdir.to_path_buf())
        .arg("-cf")
        .arg(archive_name)
        .args(files.iter().cloned())
}

/// File extension of a fetched file, for single-file renames
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Staged name for a single fetched file: `<stem>.<original extension>`
pub fn staged_single_name(stem: &str, original: &str) -> String {
    format!("{stem}.{}", file_extension(original))
}

/// Staged name for an archived multi-file fetch: `<stem>.tar`
pub fn staged_archive_name(stem: &str) -> String {
    format!("{stem}.tar")
}
