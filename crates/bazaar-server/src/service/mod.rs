//! Business services shared by the HTTP handlers and the WebSocket relay

pub mod dashboard;
pub mod messaging;
pub mod payment;
pub mod subscription;

pub use dashboard::{AnalyticsReport, DashboardService, DashboardSummary};
pub use messaging::MessagingService;
pub use payment::{
    InMemoryPaymentGateway, NewPaymentIntent, PaymentGateway, PaymentIntent, PaymentIntentStatus,
    PaymentPurpose, PaymentService,
};
pub use subscription::{SubscriptionService, UsageSummary};

use std::future::Future;

use bazaar_common::CacheManager;

use crate::metrics;

/// Cached query with hit/miss counters recorded under `cache_name`
pub async fn fetch_cached<V, F, Fut>(
    cache_name: &str,
    cache: &CacheManager<V>,
    key: &str,
    query: F,
) -> anyhow::Result<V>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<V>>,
{
    let mut missed = false;
    let result = cache
        .fetch(key, None, || {
            missed = true;
            query()
        })
        .await;

    if missed {
        metrics::record_cache_miss(cache_name);
        metrics::set_cache_size(cache_name, cache.len());
    } else {
        metrics::record_cache_hit(cache_name);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use bazaar_common::CacheConfig;

    #[tokio::test]
    async fn test_fetch_cached_runs_query_once() {
        let cache: CacheManager<u32> = CacheManager::new(CacheConfig::default());
        let first = fetch_cached("test", &cache, "k", || async { Ok(7) }).await.unwrap();
        let second = fetch_cached("test", &cache, "k", || async { Ok(8) }).await.unwrap();
        assert_eq!(first, 7);
        assert_eq!(second, 7);
    }

    #[tokio::test]
    async fn test_fetch_cached_does_not_store_errors() {
        let cache: CacheManager<u32> = CacheManager::new(CacheConfig::default());
        let failed = fetch_cached("test", &cache, "k", || async { anyhow::bail!("db down") }).await;
        assert!(failed.is_err());
        assert!(!cache.contains_key("k"));
    }
}
