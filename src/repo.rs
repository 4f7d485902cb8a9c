//! Channel and video repositories.
//!
//! Thin, repository-style functions over the two SQLite tables. Absence is
//! an `Ok(None)`, never an error; duplicate video creation is an `Ok(false)`.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{Channel, Video};

pub async fn get_channel(pool: &SqlitePool, id: &str) -> Result<Option<Channel>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT id, last_upload FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(id, last_upload)| Channel { id, last_upload }))
}

pub async fn create_channel(pool: &SqlitePool, channel: &Channel) -> Result<()> {
    sqlx::query("INSERT INTO channels (id, last_upload) VALUES (?, ?)")
        .bind(&channel.id)
        .bind(channel.last_upload)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_channel_watermark(pool: &SqlitePool, id: &str, last_upload: i64) -> Result<()> {
    sqlx::query("UPDATE channels SET last_upload = ? WHERE id = ?")
        .bind(last_upload)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_channels(pool: &SqlitePool) -> Result<Vec<Channel>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT id, last_upload FROM channels ORDER BY id")
            .fetch_all(pool)
            .await?;
    Ok(rows
        .into_iter()
        .map(|(id, last_upload)| Channel { id, last_upload })
        .collect())
}

pub async fn get_video(pool: &SqlitePool, id: &str) -> Result<Option<Video>> {
    let row: Option<(String, i64, bool, String)> =
        sqlx::query_as("SELECT id, uploaded_at, removed, playlist FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(id, uploaded_at, removed, playlist)| Video {
        id,
        uploaded_at,
        removed,
        playlist,
    }))
}

/// Insert a video if its id has never been seen. Returns whether a row was
/// actually created; a duplicate insert is a no-op success.
pub async fn create_video(pool: &SqlitePool, video: &Video) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO videos (id, uploaded_at, removed, playlist)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&video.id)
    .bind(video.uploaded_at)
    .bind(video.removed)
    .bind(&video.playlist)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Members of one playlist that are still present remotely, newest first.
pub async fn videos_in_playlist(pool: &SqlitePool, playlist: &str) -> Result<Vec<Video>> {
    let rows: Vec<(String, i64, bool, String)> = sqlx::query_as(
        r#"
        SELECT id, uploaded_at, removed, playlist FROM videos
        WHERE playlist = ? AND removed = 0
        ORDER BY uploaded_at DESC, id ASC
        "#,
    )
    .bind(playlist)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, uploaded_at, removed, playlist)| Video {
            id,
            uploaded_at,
            removed,
            playlist,
        })
        .collect())
}

/// Mark every video whose id is not in `known_ids` as removed. Returns the
/// number of rows flagged. An empty `known_ids` marks everything.
pub async fn mark_removed_except(pool: &SqlitePool, known_ids: &[String]) -> Result<u64> {
    let result = if known_ids.is_empty() {
        sqlx::query("UPDATE videos SET removed = 1 WHERE removed = 0")
            .execute(pool)
            .await?
    } else {
        let placeholders = vec!["?"; known_ids.len()].join(", ");
        let sql = format!(
            "UPDATE videos SET removed = 1 WHERE removed = 0 AND id NOT IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in known_ids {
            query = query.bind(id);
        }
        query.execute(pool).await?
    };
    Ok(result.rows_affected())
}
