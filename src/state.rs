use std::sync::Arc;

use crate::store::{Store, StoreResult};
use crate::utils::username_cache::UsernameCache;
use crate::utils::username_filter::UsernameFilter;

/// Shared per-process state handed to every handler via `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub usernames: Arc<UsernameIndex>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            usernames: Arc::new(UsernameIndex::default()),
        }
    }
}

/// Three-tier username lookup: cuckoo filter, cache of taken names, then the store.
#[derive(Default)]
pub struct UsernameIndex {
    pub filter: UsernameFilter,
    pub cache: UsernameCache,
}

impl UsernameIndex {
    /// true  => username AVAILABLE
    /// false => username TAKEN
    pub async fn is_available(&self, store: &dyn Store, username: &str) -> StoreResult<bool> {
        // Fast negative: never inserted means never taken
        if !self.filter.might_exist(username) {
            return Ok(true);
        }
        if self.cache.is_taken(username).await {
            return Ok(false);
        }
        let exists = store.username_exists(username).await?;
        if exists {
            self.cache.mark_taken(username).await;
        }
        Ok(!exists)
    }

    pub async fn record(&self, username: &str) {
        self.filter.insert(username);
        self.cache.mark_taken(username).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use crate::model::user::NewUser;
    use crate::store::UserStore;
    use crate::store::memory::MemoryStore;

    #[actix_web::test]
    async fn store_is_consulted_only_after_a_filter_hit() {
        let store = MemoryStore::new();
        let index = UsernameIndex::default();

        store
            .create_user(NewUser {
                username: "acme".into(),
                password_hash: "x".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        // Not warmed: the filter answers alone
        assert!(index.is_available(&store, "acme").await.unwrap());

        index.filter.insert("acme");
        assert!(!index.is_available(&store, "ACME").await.unwrap());
        assert!(index.cache.is_taken("acme").await);
    }

    #[actix_web::test]
    async fn record_marks_both_tiers() {
        let store = MemoryStore::new();
        let index = UsernameIndex::default();

        index.record("globex").await;
        assert!(index.filter.might_exist("globex"));
        assert!(!index.is_available(&store, "globex").await.unwrap());
    }
}
