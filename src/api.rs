//! Piped API client.
//!
//! Talks to a Piped-compatible instance over its JSON API: session-token
//! login, subscription listing, channel feed pages, and playlist management.
//! The [`FeedApi`] trait is the seam between the synchronization engine and
//! the network; tests substitute scripted implementations.
//!
//! # Endpoints
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | login | `POST /login` |
//! | subscriptions | `GET /subscriptions` |
//! | channel + first feed page | `GET {subscription.url}` |
//! | further feed pages | `GET /nextpage/channel/{id}?nextpage=` |
//! | playlists | `GET /user/playlists/` |
//! | playlist members | `GET /playlists/{id}` |
//! | create playlist | `POST /user/playlists/create` |
//! | clear playlist | `POST /user/playlists/clear` |
//! | add members | `POST /user/playlists/add` |
//!
//! Authenticated requests carry the raw session token in the `Authorization`
//! header. Reads use a short timeout; playlist mutations can be slow on
//! large playlists and get a generous one.
//!
//! # Feed entries
//!
//! Feed entries reference videos by watch url (`/watch?v=<id>`), carry the
//! upload time as epoch milliseconds, and mark scheduled-but-unpublished
//! videos with a negative view counter. The client normalizes all of that
//! into [`FeedVideo`] before anything else sees it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::models::{ChannelFeed, FeedPage, FeedVideo, Playlist, Subscription};

/// Remote operations the synchronization engine consumes.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// The user's subscriptions.
    async fn fetch_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// A channel and the first page of its feed, newest first.
    async fn fetch_channel(&self, subscription: &Subscription) -> Result<ChannelFeed>;

    /// One further feed page for a channel.
    async fn fetch_channel_page(&self, channel_id: &str, page_token: &str) -> Result<FeedPage>;

    /// All playlists owned by the authenticated user.
    async fn fetch_playlists(&self) -> Result<Vec<Playlist>>;

    /// The video ids currently in a playlist.
    async fn fetch_playlist_items(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Create an empty playlist, returning its id.
    async fn create_playlist(&self, name: &str) -> Result<String>;

    /// Remove every video from a playlist.
    async fn clear_playlist(&self, playlist_id: &str) -> Result<()>;

    /// Append videos to a playlist, in the given order.
    async fn add_playlist_items(&self, playlist_id: &str, video_ids: &[String]) -> Result<()>;
}

const READ_TIMEOUT: Duration = Duration::from_secs(10);
// Clearing or filling a large playlist is slow on most instances.
const WRITE_TIMEOUT: Duration = Duration::from_secs(180);

/// Authenticated client for one Piped instance.
pub struct PipedClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl PipedClient {
    /// Authenticate against the instance and return a ready client.
    pub async fn login(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::new();
        let response = http
            .post(format!("{base_url}/login"))
            .timeout(READ_TIMEOUT)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .with_context(|| format!("login request to '{base_url}' failed"))?
            .error_for_status()
            .context("login rejected by the instance")?;
        let login: LoginResponse = response.json().await.context("malformed login response")?;
        debug!("authenticated on the instance");
        Ok(Self {
            base_url,
            token: login.token,
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self
            .http
            .get(&url)
            .header("Authorization", &self.token)
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("request to '{url}' failed"))?
            .error_for_status()
            .with_context(|| format!("invalid response from '{url}'"))?;
        response
            .json()
            .await
            .with_context(|| format!("malformed response from '{url}'"))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("Authorization", &self.token)
            .timeout(WRITE_TIMEOUT)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to '{url}' failed"))?
            .error_for_status()
            .with_context(|| format!("invalid response from '{url}'"))?;
        response
            .json()
            .await
            .with_context(|| format!("malformed response from '{url}'"))
    }

    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .post(&url)
            .header("Authorization", &self.token)
            .timeout(WRITE_TIMEOUT)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to '{url}' failed"))?
            .error_for_status()
            .with_context(|| format!("invalid response from '{url}'"))?;
        Ok(())
    }
}

#[async_trait]
impl FeedApi for PipedClient {
    async fn fetch_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions: Vec<SubscriptionDto> = self
            .get_json(format!("{}/subscriptions", self.base_url))
            .await?;
        Ok(subscriptions
            .into_iter()
            .map(|dto| Subscription {
                url: dto.url,
                name: dto.name,
            })
            .collect())
    }

    async fn fetch_channel(&self, subscription: &Subscription) -> Result<ChannelFeed> {
        let channel: ChannelDto = self
            .get_json(format!("{}{}", self.base_url, subscription.url))
            .await?;
        Ok(ChannelFeed {
            id: channel.id,
            videos: feed_videos(channel.related_streams),
            next_page: non_empty(channel.nextpage),
        })
    }

    async fn fetch_channel_page(&self, channel_id: &str, page_token: &str) -> Result<FeedPage> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/nextpage/channel/{}", self.base_url, channel_id),
            [("nextpage", page_token)],
        )
        .context("invalid next-page url")?;
        let page: NextPageDto = self.get_json(url.to_string()).await?;
        Ok(FeedPage {
            videos: feed_videos(page.related_streams),
            next_page: non_empty(page.nextpage),
        })
    }

    async fn fetch_playlists(&self) -> Result<Vec<Playlist>> {
        let playlists: Vec<PlaylistDto> = self
            .get_json(format!("{}/user/playlists/", self.base_url))
            .await?;
        Ok(playlists
            .into_iter()
            .map(|dto| Playlist {
                id: dto.id,
                name: dto.name,
            })
            .collect())
    }

    async fn fetch_playlist_items(&self, playlist_id: &str) -> Result<Vec<String>> {
        let info: PlaylistInfoDto = self
            .get_json(format!("{}/playlists/{}", self.base_url, playlist_id))
            .await?;
        Ok(info
            .related_streams
            .iter()
            .filter_map(|stream| video_id_from_url(&stream.url))
            .map(str::to_string)
            .collect())
    }

    async fn create_playlist(&self, name: &str) -> Result<String> {
        let created: CreatedPlaylistDto = self
            .post_json("/user/playlists/create", &CreatePlaylistRequest { name })
            .await?;
        Ok(created.playlist_id)
    }

    async fn clear_playlist(&self, playlist_id: &str) -> Result<()> {
        self.post_unit("/user/playlists/clear", &ClearPlaylistRequest { playlist_id })
            .await
    }

    async fn add_playlist_items(&self, playlist_id: &str, video_ids: &[String]) -> Result<()> {
        self.post_unit(
            "/user/playlists/add",
            &AddVideosRequest {
                playlist_id,
                video_ids,
            },
        )
        .await
    }
}

/// Video id from a watch url, e.g. `/watch?v=123-456789` → `123-456789`.
pub(crate) fn video_id_from_url(url: &str) -> Option<&str> {
    url.split_once('=')
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
}

fn feed_videos(streams: Vec<RelatedStreamDto>) -> Vec<FeedVideo> {
    streams
        .into_iter()
        .filter_map(|stream| {
            let id = match video_id_from_url(&stream.url) {
                Some(id) => id.to_string(),
                None => {
                    debug!(url = %stream.url, "skipping feed entry without a video id");
                    return None;
                }
            };
            let uploaded = DateTime::from_timestamp_millis(stream.uploaded)?;
            Some(FeedVideo {
                id,
                uploaded,
                ready: stream.views >= 0,
            })
        })
        .collect()
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

// ============ Wire DTOs ============

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct SubscriptionDto {
    url: String,
    name: String,
}

#[derive(Deserialize)]
struct RelatedStreamDto {
    url: String,
    #[serde(default)]
    uploaded: i64,
    #[serde(default)]
    views: i64,
}

#[derive(Deserialize)]
struct ChannelDto {
    id: String,
    #[serde(default)]
    nextpage: Option<String>,
    #[serde(rename = "relatedStreams", default)]
    related_streams: Vec<RelatedStreamDto>,
}

#[derive(Deserialize)]
struct NextPageDto {
    #[serde(default)]
    nextpage: Option<String>,
    #[serde(rename = "relatedStreams", default)]
    related_streams: Vec<RelatedStreamDto>,
}

#[derive(Deserialize)]
struct PlaylistDto {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct PlaylistInfoDto {
    #[serde(rename = "relatedStreams", default)]
    related_streams: Vec<RelatedStreamDto>,
}

#[derive(Serialize)]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreatedPlaylistDto {
    #[serde(rename = "playlistId")]
    playlist_id: String,
}

#[derive(Serialize)]
struct ClearPlaylistRequest<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
}

#[derive(Serialize)]
struct AddVideosRequest<'a> {
    #[serde(rename = "playlistId")]
    playlist_id: &'a str,
    #[serde(rename = "videoIds")]
    video_ids: &'a [String],
}
