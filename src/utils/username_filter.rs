use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::model::user::normalize_username;
use crate::store::StoreResult;

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Probabilistic set of taken usernames. A miss is definitive, a hit is not.
pub struct UsernameFilter {
    filter: RwLock<CuckooFilter<String>>,
}

impl Default for UsernameFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameFilter {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }

    /// Check if a username might exist (false positives possible)
    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize_username(username);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&username)
    }

    pub fn insert(&self, username: &str) {
        let username = normalize_username(username);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&username);
    }

    /// Warm up the filter from a username stream, inserting in batches.
    pub async fn warmup(
        &self,
        mut usernames: BoxStream<'_, StoreResult<String>>,
        batch_size: usize,
    ) -> Result<usize> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = usernames.next().await {
            let username = row.context("username stream failed")?;
            batch.push(normalize_username(&username));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch);
        }

        tracing::info!(total, "Username filter warmup complete");
        Ok(total)
    }

    /// Insert a batch of normalized usernames
    fn insert_batch(&self, usernames: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
        for username in usernames {
            filter.add(username);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn lookups_ignore_case_and_whitespace() {
        let filter = UsernameFilter::new();
        assert!(!filter.might_exist("northwind"));

        filter.insert(" NorthWind ");
        assert!(filter.might_exist("northwind"));
    }

    #[actix_web::test]
    async fn warmup_loads_every_streamed_name() {
        let filter = UsernameFilter::new();
        let names = stream::iter(["alpha", "Beta", "gamma"].map(|n| Ok(n.to_string()))).boxed();

        let total = filter.warmup(names, 2).await.unwrap();

        assert_eq!(total, 3);
        assert!(filter.might_exist("beta"));
        assert!(filter.might_exist("gamma"));
    }
}
