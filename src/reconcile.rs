//! Remote playlist reconciliation.
//!
//! Two phases. Capture: collect the ids currently present in any mirrored
//! playlist on the instance and flag every ledger video outside that union
//! as manually removed. Push: for each playlist touched by newly indexed
//! videos, clear (or create) the remote playlist and re-add the ledger's
//! full membership. Clear-then-rebuild makes the remote end converge on the
//! ledger no matter what drift manual edits have accumulated.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use crate::api::FeedApi;
use crate::models::Playlist;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::repo;

/// Phase A: flag ledger videos that are no longer in any mirrored playlist.
///
/// Returns the number of videos flagged. Any failure here only affects
/// staleness bookkeeping, never the correctness of this run's pushes; the
/// caller logs it as a warning and carries on. When a member listing fails
/// mid-way the marking is skipped entirely — marking against a partial
/// union would flag videos that are in fact still present.
pub async fn capture_remote_membership(
    api: &dyn FeedApi,
    pool: &SqlitePool,
    prefix: &str,
) -> Result<u64> {
    let playlists = fetch_prefixed_playlists(api, prefix)
        .await
        .context("unable to retrieve the playlists from the instance")?;

    let mut known_ids = Vec::new();
    for playlist in &playlists {
        let ids = api
            .fetch_playlist_items(&playlist.id)
            .await
            .with_context(|| format!("unable to list the videos of playlist '{}'", playlist.name))?;
        known_ids.extend(ids);
    }
    known_ids.sort();
    known_ids.dedup();

    let marked = repo::mark_removed_except(pool, &known_ids)
        .await
        .context("unable to mark videos as manually removed")?;
    if marked > 0 {
        debug!(marked, "videos no longer present in any mirrored playlist");
    }
    Ok(marked)
}

/// Phase B: rebuild every touched playlist from the ledger.
///
/// Strictly sequential; the first failure aborts the remaining pushes. A
/// cleared-but-unfilled playlist must never be mistaken for a completed one,
/// and re-running the whole pass is safe because the rebuild is idempotent.
pub async fn push_playlists(
    api: &dyn FeedApi,
    pool: &SqlitePool,
    playlist_names: &[String],
    prefix: &str,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    if playlist_names.is_empty() {
        return Ok(0);
    }

    // Identity is never cached across runs: list afresh right before pushing.
    let existing = fetch_prefixed_playlists(api, prefix)
        .await
        .context("unable to retrieve the playlists from the instance")?;
    let by_name: HashMap<&str, &Playlist> = existing
        .iter()
        .map(|playlist| (playlist.name.as_str(), playlist))
        .collect();

    for name in playlist_names {
        debug!(playlist = %name, "rebuilding playlist");
        let playlist_id = match by_name.get(name.as_str()) {
            Some(playlist) => {
                api.clear_playlist(&playlist.id)
                    .await
                    .with_context(|| format!("can't clear the existing playlist '{name}'"))?;
                playlist.id.clone()
            }
            None => api
                .create_playlist(name)
                .await
                .with_context(|| format!("can't create the playlist '{name}'"))?,
        };

        let videos = repo::videos_in_playlist(pool, name)
            .await
            .with_context(|| format!("can't read the playlist '{name}' from the database"))?;
        let video_ids: Vec<String> = videos.into_iter().map(|video| video.id).collect();
        if !video_ids.is_empty() {
            api.add_playlist_items(&playlist_id, &video_ids)
                .await
                .with_context(|| format!("can't insert videos into playlist '{name}'"))?;
        }
        progress.report(ProgressEvent::Pushed {
            playlist: name.clone(),
            count: video_ids.len() as u64,
        });
    }
    Ok(playlist_names.len())
}

async fn fetch_prefixed_playlists(api: &dyn FeedApi, prefix: &str) -> Result<Vec<Playlist>> {
    Ok(api
        .fetch_playlists()
        .await?
        .into_iter()
        .filter(|playlist| playlist.name.starts_with(prefix))
        .collect())
}
