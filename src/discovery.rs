//! Paginated channel discovery.
//!
//! Walks each subscribed channel's feed newest-first and collects the videos
//! inside the allowed window. The chronological lower bound is exclusive: a
//! video whose timestamp is not strictly newer than the bound stops the walk
//! for that channel, so the boundary video is never re-emitted across runs.
//! Page decisions are strictly sequential and based only on that page's own
//! content; a disallowed video mid-page stops the walk immediately, even if
//! a next-page token is present.
//!
//! Across channels, discovery runs on a bounded worker pool. A fetch error
//! for one channel is logged and counts as zero new videos for that channel;
//! it never aborts the run.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::api::FeedApi;
use crate::models::{Channel, FeedVideo, Subscription};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::repo;
use crate::sync::SyncOptions;
use crate::window;

/// Discover new videos for one channel and advance its watermark.
///
/// Returns the allowed videos in feed order (may be empty). The watermark is
/// only written when at least one video was found, and never regresses.
pub async fn discover_channel(
    api: &dyn FeedApi,
    pool: &SqlitePool,
    subscription: &Subscription,
    horizon: DateTime<Utc>,
    opts: &SyncOptions,
) -> Result<Vec<FeedVideo>> {
    debug!(channel = %subscription.name, "fetching subscription channel");
    let feed = api.fetch_channel(subscription).await?;

    let channel = match repo::get_channel(pool, &feed.id).await? {
        Some(channel) => channel,
        None => {
            debug!(channel = %subscription.name, "channel not tracked yet, creating it");
            let channel = Channel {
                id: feed.id.clone(),
                last_upload: 0,
            };
            if !opts.dry_run {
                repo::create_channel(pool, &channel).await?;
            }
            channel
        }
    };

    let watermark = DateTime::from_timestamp(channel.last_upload, 0)
        .with_context(|| format!("corrupt watermark for channel '{}'", channel.id))?;
    let oldest = if opts.full {
        horizon
    } else {
        window::oldest_allowed(horizon, watermark)
    };
    debug!(channel = %subscription.name, since = %oldest, "fetching videos");

    let mut allowed = Vec::new();
    let mut videos = feed.videos;
    let mut next_page = feed.next_page;
    loop {
        let scan = scan_page(&videos, oldest, &mut allowed);
        // Only keep paginating while the walk has not hit the bound and the
        // page just scanned still contributed something.
        if scan.stopped || scan.allowed == 0 {
            break;
        }
        let token = match next_page.take() {
            Some(token) => token,
            None => break,
        };
        let page = api.fetch_channel_page(&feed.id, &token).await?;
        videos = page.videos;
        next_page = page.next_page;
    }
    debug!(channel = %subscription.name, count = allowed.len(), "videos found");

    if let Some(newest) = allowed.iter().map(|video| video.uploaded).max() {
        if !opts.dry_run && newest.timestamp() > channel.last_upload {
            repo::update_channel_watermark(pool, &feed.id, newest.timestamp()).await?;
        }
    }
    Ok(allowed)
}

struct PageScan {
    stopped: bool,
    allowed: usize,
}

fn scan_page(videos: &[FeedVideo], oldest: DateTime<Utc>, out: &mut Vec<FeedVideo>) -> PageScan {
    let mut scan = PageScan {
        stopped: false,
        allowed: 0,
    };
    for video in videos {
        if !video.ready {
            // Scheduled premiere: not published yet, says nothing about age.
            continue;
        }
        if video.uploaded > oldest {
            out.push(video.clone());
            scan.allowed += 1;
        } else {
            scan.stopped = true;
            break;
        }
    }
    scan
}

/// Discover new videos across all subscriptions on a bounded worker pool.
///
/// The merged result is sorted newest-first (ties broken by id) so that
/// ingestion order and logging are deterministic across runs.
pub async fn discover_all(
    api: Arc<dyn FeedApi>,
    pool: &SqlitePool,
    subscriptions: &[Subscription],
    horizon: DateTime<Utc>,
    parallelism: usize,
    opts: SyncOptions,
    progress: &dyn ProgressReporter,
) -> Vec<FeedVideo> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut tasks = JoinSet::new();
    for subscription in subscriptions.iter().cloned() {
        let api = Arc::clone(&api);
        let pool = pool.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed while tasks are running.
                Err(_) => return (subscription, Ok(Vec::new())),
            };
            let result =
                discover_channel(api.as_ref(), &pool, &subscription, horizon, &opts).await;
            drop(permit);
            (subscription, result)
        });
    }

    let total = subscriptions.len() as u64;
    let mut done = 0u64;
    let mut videos = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        done += 1;
        match joined {
            Ok((_, Ok(mut found))) => videos.append(&mut found),
            Ok((subscription, Err(err))) => {
                warn!(
                    channel = %subscription.name,
                    error = %format!("{err:#}"),
                    "unable to retrieve new videos, skipping this channel for this run"
                );
            }
            Err(err) => warn!(error = %err, "discovery task failed"),
        }
        progress.report(ProgressEvent::Channel { n: done, total });
    }

    videos.sort_by(|a, b| b.uploaded.cmp(&a.uploaded).then_with(|| a.id.cmp(&b.id)));
    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{ChannelFeed, FeedPage, Playlist};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Feed fake serving a fixed set of pages and recording which page
    /// tokens were requested.
    struct PagedFeed {
        channel_id: String,
        first: (Vec<FeedVideo>, Option<String>),
        pages: HashMap<String, FeedPage>,
        requested: Mutex<Vec<String>>,
    }

    impl PagedFeed {
        fn new(first: (Vec<FeedVideo>, Option<String>)) -> Self {
            Self {
                channel_id: "chan-1".to_string(),
                first,
                pages: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_page(mut self, token: &str, page: FeedPage) -> Self {
            self.pages.insert(token.to_string(), page);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedApi for PagedFeed {
        async fn fetch_subscriptions(&self) -> Result<Vec<Subscription>> {
            Ok(vec![subscription()])
        }

        async fn fetch_channel(&self, _subscription: &Subscription) -> Result<ChannelFeed> {
            Ok(ChannelFeed {
                id: self.channel_id.clone(),
                videos: self.first.0.clone(),
                next_page: self.first.1.clone(),
            })
        }

        async fn fetch_channel_page(
            &self,
            _channel_id: &str,
            page_token: &str,
        ) -> Result<FeedPage> {
            self.requested.lock().unwrap().push(page_token.to_string());
            self.pages
                .get(page_token)
                .cloned()
                .ok_or_else(|| anyhow!("unknown page '{page_token}'"))
        }

        async fn fetch_playlists(&self) -> Result<Vec<Playlist>> {
            Ok(Vec::new())
        }
        async fn fetch_playlist_items(&self, _playlist_id: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn create_playlist(&self, _name: &str) -> Result<String> {
            Ok("p1".to_string())
        }
        async fn clear_playlist(&self, _playlist_id: &str) -> Result<()> {
            Ok(())
        }
        async fn add_playlist_items(
            &self,
            _playlist_id: &str,
            _video_ids: &[String],
        ) -> Result<()> {
            Ok(())
        }
    }

    fn subscription() -> Subscription {
        Subscription {
            url: "/channel/chan-1".to_string(),
            name: "Channel One".to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn video(id: &str, secs: i64) -> FeedVideo {
        FeedVideo {
            id: id.to_string(),
            uploaded: at(secs),
            ready: true,
        }
    }

    fn opts() -> SyncOptions {
        SyncOptions {
            full: false,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn early_stop_never_fetches_pages_past_the_bound() {
        let pool = test_pool().await;
        // Page 1: all newer. Page 2: two allowed, then one too old, then a
        // token pointing at page 3 which must never be requested.
        let api = PagedFeed::new((
            vec![video("a", 1000), video("b", 900), video("c", 800)],
            Some("p2".to_string()),
        ))
        .with_page(
            "p2",
            FeedPage {
                videos: vec![video("d", 700), video("e", 600), video("old", 100)],
                next_page: Some("p3".to_string()),
            },
        )
        .with_page(
            "p3",
            FeedPage {
                videos: vec![video("never", 50)],
                next_page: None,
            },
        );

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(api.requested(), vec!["p2"]);
    }

    #[tokio::test]
    async fn video_exactly_at_the_bound_is_excluded() {
        let pool = test_pool().await;
        let api = PagedFeed::new((vec![video("new", 1000), video("edge", 500)], None));

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test]
    async fn unpublished_videos_are_skipped_without_stopping() {
        let pool = test_pool().await;
        let mut scheduled = video("scheduled", 100);
        scheduled.ready = false;
        let api = PagedFeed::new((
            vec![video("a", 1000), scheduled, video("b", 900)],
            None,
        ));

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn page_without_allowed_videos_stops_pagination() {
        let pool = test_pool().await;
        let mut scheduled = video("scheduled", 1000);
        scheduled.ready = false;
        let api = PagedFeed::new((vec![scheduled], Some("p2".to_string()))).with_page(
            "p2",
            FeedPage {
                videos: vec![video("later", 900)],
                next_page: None,
            },
        );

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        assert!(found.is_empty());
        assert!(api.requested().is_empty());
    }

    #[tokio::test]
    async fn watermark_advances_and_second_run_finds_nothing() {
        let pool = test_pool().await;
        let api = PagedFeed::new((vec![video("a", 1000), video("b", 900)], None));

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        let channel = repo::get_channel(&pool, "chan-1").await.unwrap().unwrap();
        assert_eq!(channel.last_upload, 1000);

        // Same remote data, same horizon: the watermark now excludes it all.
        let again = discover_channel(&api, &pool, &subscription(), at(500), &opts())
            .await
            .unwrap();
        assert!(again.is_empty());
        let channel = repo::get_channel(&pool, "chan-1").await.unwrap().unwrap();
        assert_eq!(channel.last_upload, 1000);
    }

    #[tokio::test]
    async fn dry_run_leaves_the_database_untouched() {
        let pool = test_pool().await;
        let api = PagedFeed::new((vec![video("a", 1000)], None));
        let opts = SyncOptions {
            full: false,
            dry_run: true,
        };

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(repo::get_channel(&pool, "chan-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_scan_never_regresses_the_watermark() {
        let pool = test_pool().await;
        repo::create_channel(
            &pool,
            &Channel {
                id: "chan-1".to_string(),
                last_upload: 2000,
            },
        )
        .await
        .unwrap();
        let api = PagedFeed::new((vec![video("a", 1000)], None));
        let opts = SyncOptions {
            full: true,
            dry_run: false,
        };

        let found = discover_channel(&api, &pool, &subscription(), at(500), &opts)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let channel = repo::get_channel(&pool, "chan-1").await.unwrap().unwrap();
        assert_eq!(channel.last_upload, 2000);
    }

    #[tokio::test]
    async fn merged_discovery_is_sorted_newest_first() {
        let pool = test_pool().await;
        let api: Arc<dyn FeedApi> = Arc::new(PagedFeed::new((
            vec![video("b", 900), video("a", 900), video("c", 1000)],
            None,
        )));

        let videos = discover_all(
            api,
            &pool,
            &[subscription()],
            at(500),
            2,
            opts(),
            &crate::progress::NoProgress,
        )
        .await;
        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
