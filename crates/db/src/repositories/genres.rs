use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row};
use statusfy_core::domain::genre::GenreMapping;
use statusfy_core::errors::StoreError;
use statusfy_core::ports::GenreMappingStore;

use super::{parse_rfc3339, RepositoryError};
use crate::DbPool;

pub struct SqlGenreMappingStore {
    pool: DbPool,
}

impl SqlGenreMappingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_matching_rows(
        &self,
        team_id: &str,
        genres: &[String],
    ) -> Result<Vec<GenreMapping>, RepositoryError> {
        if genres.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::new(
            "SELECT team_id, genre, emoji, created_at FROM genre_emoji WHERE team_id = ",
        );
        query.push_bind(team_id);
        query.push(" AND genre IN (");
        let mut separated = query.separated(", ");
        for genre in genres {
            separated.push_bind(genre);
        }
        query.push(")");
        // rowid order is the registration order; callers take the first
        // match, which keeps the documented store-order tie-break stable.
        query.push(" ORDER BY rowid");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(mapping_from_row).collect()
    }

    async fn insert_many_rows(&self, mappings: &[GenreMapping]) -> Result<(), RepositoryError> {
        for mapping in mappings {
            sqlx::query(
                "INSERT OR IGNORE INTO genre_emoji (team_id, genre, emoji, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&mapping.team_id)
            .bind(&mapping.genre)
            .bind(&mapping.emoji)
            .bind(mapping.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl GenreMappingStore for SqlGenreMappingStore {
    async fn find_matching(
        &self,
        team_id: &str,
        genres: &[String],
    ) -> Result<Vec<GenreMapping>, StoreError> {
        self.find_matching_rows(team_id, genres).await.map_err(Into::into)
    }

    async fn insert_many(&self, mappings: &[GenreMapping]) -> Result<(), StoreError> {
        self.insert_many_rows(mappings).await.map_err(Into::into)
    }
}

fn mapping_from_row(row: &SqliteRow) -> Result<GenreMapping, RepositoryError> {
    Ok(GenreMapping {
        team_id: row.try_get("team_id")?,
        genre: row.try_get("genre")?,
        emoji: row.try_get("emoji")?,
        created_at: parse_rfc3339(
            "genre_emoji created_at",
            &row.try_get::<String, _>("created_at")?,
        )?,
    })
}

#[cfg(test)]
mod tests {
    use statusfy_core::chrono::Utc;
    use statusfy_core::domain::genre::GenreMapping;
    use statusfy_core::ports::GenreMappingStore;

    use super::SqlGenreMappingStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        // A single-connection pool keeps the in-memory database private
        // to this test.
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn mapping(team_id: &str, genre: &str, emoji: &str) -> GenreMapping {
        GenreMapping::new(team_id, genre, emoji, Utc::now())
    }

    #[tokio::test]
    async fn find_matching_returns_registration_order() {
        let pool = setup_pool().await;
        let store = SqlGenreMappingStore::new(pool.clone());

        store
            .insert_many(&[
                mapping("T-1", "metalcore", ":guitar:"),
                mapping("T-1", "deathcore", ":punch:"),
            ])
            .await
            .expect("insert");

        let genres = vec!["deathcore".to_owned(), "metalcore".to_owned()];
        let matched = store.find_matching("T-1", &genres).await.expect("find");

        assert_eq!(matched.len(), 2);
        // First registered wins, independent of the lookup order.
        assert_eq!(matched[0].genre, "metalcore");
        assert_eq!(matched[0].emoji, ":guitar:");

        pool.close().await;
    }

    #[tokio::test]
    async fn find_matching_is_scoped_per_team() {
        let pool = setup_pool().await;
        let store = SqlGenreMappingStore::new(pool.clone());

        store
            .insert_many(&[
                mapping("T-1", "deathcore", ":punch:"),
                mapping("T-2", "deathcore", ":fire:"),
            ])
            .await
            .expect("insert");

        let genres = vec!["deathcore".to_owned()];
        let matched = store.find_matching("T-2", &genres).await.expect("find");

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].emoji, ":fire:");

        pool.close().await;
    }

    #[tokio::test]
    async fn insert_many_never_overwrites_existing_mappings() {
        let pool = setup_pool().await;
        let store = SqlGenreMappingStore::new(pool.clone());

        store.insert_many(&[mapping("T-1", "deathcore", ":punch:")]).await.expect("insert");
        store
            .insert_many(&[mapping("T-1", "deathcore", ":changed:")])
            .await
            .expect("re-insert");

        let genres = vec!["deathcore".to_owned()];
        let matched = store.find_matching("T-1", &genres).await.expect("find");

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].emoji, ":punch:", "mappings are insert-only");

        pool.close().await;
    }

    #[tokio::test]
    async fn empty_genre_set_short_circuits() {
        let pool = setup_pool().await;
        let store = SqlGenreMappingStore::new(pool.clone());

        let matched = store.find_matching("T-1", &[]).await.expect("find");
        assert!(matched.is_empty());

        pool.close().await;
    }
}
