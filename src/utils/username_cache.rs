use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::BoxStream;
use futures_util::StreamExt;
use moka::future::Cache;

use crate::model::user::normalize_username;
use crate::store::StoreResult;

const CACHE_CAPACITY: u64 = 500_000;
const CACHE_TTL: Duration = Duration::from_secs(86_400); // 24h

/// Usernames known to be taken. Only positives are cached.
#[derive(Clone)]
pub struct UsernameCache {
    cache: Cache<String, bool>,
}

impl Default for UsernameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameCache {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    pub async fn mark_taken(&self, username: &str) {
        self.cache.insert(normalize_username(username), true).await;
    }

    pub async fn is_taken(&self, username: &str) -> bool {
        self.cache
            .get(&normalize_username(username))
            .await
            .unwrap_or(false)
    }

    async fn batch_mark(&self, usernames: &[String]) {
        let inserts: Vec<_> = usernames
            .iter()
            .map(|u| self.cache.insert(normalize_username(u), true))
            .collect();
        futures::future::join_all(inserts).await;
    }

    /// Load recently active usernames (the caller picks the window) in batches.
    pub async fn warmup(
        &self,
        mut usernames: BoxStream<'_, StoreResult<String>>,
        batch_size: usize,
    ) -> Result<usize> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = usernames.next().await {
            batch.push(row.context("username stream failed")?);
            total += 1;

            if batch.len() >= batch_size {
                self.batch_mark(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.batch_mark(&batch).await;
        }

        tracing::info!(total, "Username cache warmup complete");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[actix_web::test]
    async fn marked_names_are_taken_case_insensitively() {
        let cache = UsernameCache::new();
        assert!(!cache.is_taken("acme").await);

        cache.mark_taken("ACME").await;
        assert!(cache.is_taken("acme").await);
    }

    #[actix_web::test]
    async fn warmup_stops_on_stream_error() {
        let cache = UsernameCache::new();
        let names = stream::iter(vec![
            Ok("first".to_string()),
            Err(crate::store::StoreError::Backend("gone".into())),
        ])
        .boxed();

        assert!(cache.warmup(names, 10).await.is_err());
    }
}
