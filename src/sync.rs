//! Synchronization orchestration.
//!
//! One run walks five steps: fetch subscriptions, capture remote playlist
//! membership, discover new videos, index them into the ledger, and rebuild
//! the touched playlists. Membership capture runs before discovery so that
//! videos first seen in this run can never be mistaken for manually removed
//! ones. Nothing is kept in memory between runs; all cross-run state lives
//! in the `channels` and `videos` tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::api::FeedApi;
use crate::buckets;
use crate::config::Config;
use crate::discovery;
use crate::models::{FeedVideo, Video};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::reconcile;
use crate::repo;
use crate::window;

/// Per-invocation switches for a sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Ignore per-channel watermarks; rescan the whole configured window.
    pub full: bool,
    /// Discover and report only: no database writes, no remote mutations.
    pub dry_run: bool,
}

/// What one run did, for the caller's summary output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncSummary {
    pub subscriptions: usize,
    pub new_videos: usize,
    pub indexed: usize,
    pub playlists_pushed: usize,
    pub removed_marked: u64,
}

const STEPS: u8 = 5;

fn step(progress: &dyn ProgressReporter, step: u8, label: &'static str) {
    progress.report(ProgressEvent::Step {
        step,
        total: STEPS,
        label,
    });
}

/// Run one synchronization pass.
///
/// Returns early (with an informational console message) when there are no
/// subscriptions or no new videos. Per-channel discovery failures are
/// logged and skipped; a playlist push failure is fatal for the run.
pub async fn run_sync(
    config: &Config,
    pool: &SqlitePool,
    api: Arc<dyn FeedApi>,
    progress: &dyn ProgressReporter,
    opts: SyncOptions,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    step(progress, 1, "Fetching subscriptions");
    debug!("fetching subscriptions");
    let subscriptions = api
        .fetch_subscriptions()
        .await
        .context("unable to retrieve the subscriptions from the instance")?;
    summary.subscriptions = subscriptions.len();
    debug!(count = subscriptions.len(), "subscriptions found");
    if subscriptions.is_empty() {
        println!("no subscriptions found, stopping the synchronization");
        return Ok(summary);
    }

    if !opts.dry_run {
        step(progress, 2, "Capturing playlist membership");
        match reconcile::capture_remote_membership(
            api.as_ref(),
            pool,
            &config.sync.playlist_prefix,
        )
        .await
        {
            Ok(marked) => summary.removed_marked = marked,
            Err(err) => warn!(
                error = %format!("{err:#}"),
                "membership capture failed, removed-video bookkeeping skipped for this run"
            ),
        }
    }

    step(progress, 3, "Fetching new videos");
    let horizon = window::configured_horizon(&config.sync, Local::now().date_naive())?;
    let new_videos = discovery::discover_all(
        Arc::clone(&api),
        pool,
        &subscriptions,
        horizon,
        config.sync.parallelism,
        opts,
        progress,
    )
    .await;
    summary.new_videos = new_videos.len();
    if new_videos.is_empty() {
        println!("no new videos found, stopping the synchronization");
        return Ok(summary);
    }
    info!(count = new_videos.len(), "new videos found");
    if opts.dry_run {
        return Ok(summary);
    }

    step(progress, 4, "Indexing new videos");
    let (indexed, touched) = index_videos(
        pool,
        &new_videos,
        config.sync.strategy,
        &config.sync.playlist_prefix,
    )
    .await?;
    summary.indexed = indexed;
    if touched.is_empty() {
        println!("no unseen videos to index, stopping the synchronization");
        return Ok(summary);
    }

    step(progress, 5, "Populating playlists");
    summary.playlists_pushed = reconcile::push_playlists(
        api.as_ref(),
        pool,
        &touched,
        &config.sync.playlist_prefix,
        progress,
    )
    .await
    .context("unable to synchronize the playlists on the instance")?;

    Ok(summary)
}

/// Index newly discovered videos into the ledger.
///
/// Returns how many rows were actually created and the sorted set of
/// playlist names touched by at least one of them. Re-discovered videos are
/// skipped; only genuinely new ones schedule a playlist rebuild.
async fn index_videos(
    pool: &SqlitePool,
    new_videos: &[FeedVideo],
    strategy: crate::config::Strategy,
    prefix: &str,
) -> Result<(usize, Vec<String>)> {
    debug!("indexing new videos");
    let mut touched = BTreeSet::new();
    let mut indexed = 0usize;
    for video in new_videos {
        let existing = repo::get_video(pool, &video.id)
            .await
            .with_context(|| format!("can't read the video '{}' from the database", video.id))?;
        if existing.is_some() {
            // Seen on a previous run; its bucket never changes.
            continue;
        }
        let playlist = buckets::playlist_for(video.uploaded, strategy, prefix);
        let created = repo::create_video(
            pool,
            &Video {
                id: video.id.clone(),
                uploaded_at: video.uploaded.timestamp(),
                removed: false,
                playlist: playlist.clone(),
            },
        )
        .await
        .with_context(|| format!("can't create the video '{}' in the database", video.id))?;
        if created {
            indexed += 1;
            touched.insert(playlist);
        }
    }
    debug!(indexed, "indexing done");
    Ok((indexed, touched.into_iter().collect()))
}
