//! In-memory store implementations for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use statusfy_core::domain::genre::GenreMapping;
use statusfy_core::domain::user::{UserIdentity, UserRecord};
use statusfy_core::errors::StoreError;
use statusfy_core::ports::{GenreMappingStore, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    records: Mutex<HashMap<UserIdentity, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserIdentity, UserRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find(&self, identity: &UserIdentity) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.lock().get(identity).cloned())
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let mut records: Vec<_> = self.lock().values().cloned().collect();
        records.sort_by(|left, right| {
            (&left.identity.team_id, &left.identity.user_id)
                .cmp(&(&right.identity.team_id, &right.identity.user_id))
        });
        Ok(records)
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.lock().insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, identity: &UserIdentity) -> Result<(), StoreError> {
        self.lock().remove(identity);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryGenreMappingStore {
    rows: Mutex<Vec<GenreMapping>>,
}

impl InMemoryGenreMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GenreMapping>> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl GenreMappingStore for InMemoryGenreMappingStore {
    async fn find_matching(
        &self,
        team_id: &str,
        genres: &[String],
    ) -> Result<Vec<GenreMapping>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter(|row| row.team_id == team_id && genres.contains(&row.genre))
            .cloned()
            .collect())
    }

    async fn insert_many(&self, mappings: &[GenreMapping]) -> Result<(), StoreError> {
        let mut rows = self.lock();
        for mapping in mappings {
            let exists = rows
                .iter()
                .any(|row| row.team_id == mapping.team_id && row.genre == mapping.genre);
            if !exists {
                rows.push(mapping.clone());
            }
        }
        Ok(())
    }
}
