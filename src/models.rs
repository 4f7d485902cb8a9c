//! Core data models used throughout feedmirror.
//!
//! These types represent the channels, videos, and playlists that flow
//! through the discovery and reconciliation pipeline.

use chrono::{DateTime, Utc};

/// A subscription entry as listed by the remote instance.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Channel path on the instance (e.g. `/channel/UC...`).
    pub url: String,
    pub name: String,
}

/// One video as seen in a channel feed, before ingestion.
#[derive(Debug, Clone)]
pub struct FeedVideo {
    pub id: String,
    pub uploaded: DateTime<Utc>,
    /// False for entries the instance lists but has not published yet
    /// (scheduled premieres carry a negative view counter upstream).
    pub ready: bool,
}

/// A channel together with the first page of its feed.
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    pub id: String,
    pub videos: Vec<FeedVideo>,
    pub next_page: Option<String>,
}

/// One page of a channel feed past the first.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub videos: Vec<FeedVideo>,
    pub next_page: Option<String>,
}

/// A playlist as listed by the remote instance.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

/// Tracked channel row. `last_upload` is the watermark: the Unix timestamp
/// of the newest video ever discovered for this channel, 0 before the first
/// discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub last_upload: i64,
}

/// Ledger row for a discovered video. Created at most once per id; the
/// playlist assignment never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: String,
    pub uploaded_at: i64,
    /// Set when the video is no longer a member of any mirrored playlist on
    /// the remote instance (i.e. the user deleted it out-of-band).
    pub removed: bool,
    pub playlist: String,
}
