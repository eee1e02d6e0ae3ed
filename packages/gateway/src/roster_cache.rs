//! Short-lived in-memory cache in front of the roster fetch.
//!
//! Only successful fetches are cached. A failed fetch leaves any previous
//! entry untouched but is still reported as a failure so the batch aborts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use index_claims_models::PolicyRecord;
use tokio::sync::Mutex;

use crate::GatewayError;

/// Caches the most recent roster for a fixed time-to-live.
pub struct RosterCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Arc<Vec<PolicyRecord>>)>>,
}

impl RosterCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::const_new(None),
        }
    }

    /// Returns the cached roster if it is still fresh, otherwise calls
    /// `fetch` and caches its result.
    ///
    /// The lock is held across `fetch`, so concurrent callers share one
    /// roster request.
    ///
    /// # Errors
    ///
    /// Propagates the error from `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<Vec<PolicyRecord>, GatewayError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<Vec<PolicyRecord>, GatewayError>> + Send,
    {
        let mut entry = self.entry.lock().await;

        if let Some((fetched_at, records)) = entry.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            log::debug!(
                "Roster cache hit ({} policies, age {:?})",
                records.len(),
                fetched_at.elapsed()
            );
            return Ok(records.as_ref().clone());
        }

        let records = fetch().await?;
        *entry = Some((Instant::now(), Arc::new(records.clone())));
        Ok(records)
    }

    /// Drops any cached roster.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::DataService;

    fn record(policy_id: i64) -> PolicyRecord {
        PolicyRecord {
            policy_id,
            customer_id: 1,
            company_id: 1,
            zone_id: 1,
            grid_id: 1,
            period: 1,
            product_type: 1,
            sum_insured: 100.0,
        }
    }

    #[tokio::test]
    async fn reuses_fresh_roster() {
        let cache = RosterCache::new(Duration::from_secs(300));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let records = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![record(1), record(2)])
                })
                .await
                .unwrap();
            assert_eq!(records.len(), 2);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = RosterCache::new(Duration::from_secs(300));

        let err = cache
            .get_or_fetch(|| async {
                Err(GatewayError::Unavailable {
                    service: DataService::PolicyRoster,
                    message: "HTTP 503".to_string(),
                })
            })
            .await;
        assert!(err.is_err());

        let records = cache
            .get_or_fetch(|| async { Ok(vec![record(9)]) })
            .await
            .unwrap();
        assert_eq!(records[0].policy_id, 9);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = RosterCache::new(Duration::from_secs(300));
        cache.get_or_fetch(|| async { Ok(vec![record(1)]) }).await.unwrap();
        cache.invalidate().await;
        let records = cache
            .get_or_fetch(|| async { Ok(vec![record(2)]) })
            .await
            .unwrap();
        assert_eq!(records[0].policy_id, 2);
    }
}
