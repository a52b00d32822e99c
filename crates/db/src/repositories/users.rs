use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use statusfy_core::domain::user::{UserIdentity, UserRecord};
use statusfy_core::errors::StoreError;
use statusfy_core::ports::UserStore;

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlUserStore {
    pool: DbPool,
}

impl SqlUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_record(
        &self,
        identity: &UserIdentity,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id, team_id, slack_token, spotify_access_token,
                spotify_refresh_token, last_status_text, last_status_emoji,
                last_playing, original_status_text, original_status_emoji,
                sync_paused, linked_at, updated_at
            FROM linked_users
            WHERE user_id = ? AND team_id = ?
            "#,
        )
        .bind(&identity.user_id)
        .bind(&identity.team_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| user_from_row(&value)).transpose()
    }

    async fn find_all_records(&self) -> Result<Vec<UserRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                user_id, team_id, slack_token, spotify_access_token,
                spotify_refresh_token, last_status_text, last_status_emoji,
                last_playing, original_status_text, original_status_emoji,
                sync_paused, linked_at, updated_at
            FROM linked_users
            ORDER BY team_id, user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn upsert_record(&self, record: &UserRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO linked_users (
                user_id, team_id, slack_token, spotify_access_token,
                spotify_refresh_token, last_status_text, last_status_emoji,
                last_playing, original_status_text, original_status_emoji,
                sync_paused, linked_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, team_id) DO UPDATE SET
                slack_token = excluded.slack_token,
                spotify_access_token = excluded.spotify_access_token,
                spotify_refresh_token = excluded.spotify_refresh_token,
                last_status_text = excluded.last_status_text,
                last_status_emoji = excluded.last_status_emoji,
                last_playing = excluded.last_playing,
                original_status_text = excluded.original_status_text,
                original_status_emoji = excluded.original_status_emoji,
                sync_paused = excluded.sync_paused,
                linked_at = excluded.linked_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.identity.user_id)
        .bind(&record.identity.team_id)
        .bind(&record.slack_token)
        .bind(record.spotify_access_token.as_deref())
        .bind(record.spotify_refresh_token.as_deref())
        .bind(&record.last_status_text)
        .bind(record.last_status_emoji.as_deref())
        .bind(record.last_playing)
        .bind(&record.original_status_text)
        .bind(record.original_status_emoji.as_deref())
        .bind(record.sync_paused)
        .bind(record.linked_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_record(&self, identity: &UserIdentity) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM linked_users WHERE user_id = ? AND team_id = ?")
            .bind(&identity.user_id)
            .bind(&identity.team_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, StoreError> {
        self.find_record(identity).await.map_err(Into::into)
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.find_all_records().await.map_err(Into::into)
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.upsert_record(record).await.map_err(Into::into)
    }

    async fn delete(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        self.delete_record(identity).await.map_err(Into::into)
    }
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord, RepositoryError> {
    Ok(UserRecord {
        identity: UserIdentity {
            user_id: row.try_get("user_id")?,
            team_id: row.try_get("team_id")?,
        },
        slack_token: row.try_get("slack_token")?,
        spotify_access_token: row.try_get("spotify_access_token")?,
        spotify_refresh_token: row.try_get("spotify_refresh_token")?,
        last_status_text: row.try_get("last_status_text")?,
        last_status_emoji: row.try_get("last_status_emoji")?,
        last_playing: row.try_get("last_playing")?,
        original_status_text: row.try_get("original_status_text")?,
        original_status_emoji: row.try_get("original_status_emoji")?,
        sync_paused: row.try_get("sync_paused")?,
        linked_at: parse_rfc3339("linked_users linked_at", &row.try_get::<String, _>("linked_at")?)?,
        updated_at: parse_rfc3339(
            "linked_users updated_at",
            &row.try_get::<String, _>("updated_at")?,
        )?,
    })
}
