// Metrics module for observability
// Counters and gauges for the cache, the feature gate and the realtime relay

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    // Cache metrics
    describe_counter!("cache_hits_total", "Total number of cache hits");
    describe_counter!("cache_misses_total", "Total number of cache misses");
    describe_gauge!("cache_size", "Current number of items in cache");

    // Feature gate metrics
    describe_counter!(
        "feature_gate_denials_total",
        "Total number of requests rejected by the subscription gate"
    );

    // Realtime metrics
    describe_gauge!("ws_connections", "Number of authenticated WebSocket connections");
    describe_counter!(
        "ws_messages_relayed_total",
        "Total number of WebSocket events delivered to a receiver"
    );

    tracing::info!("Metrics initialized");
}

/// Record a cache hit
pub fn record_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", "cache" => cache_name.to_string()).increment(1);
}

/// Record a cache miss
pub fn record_cache_miss(cache_name: &str) {
    counter!("cache_misses_total", "cache" => cache_name.to_string()).increment(1);
}

/// Update cache size
pub fn set_cache_size(cache_name: &str, size: usize) {
    gauge!("cache_size", "cache" => cache_name.to_string()).set(size as f64);
}

/// Record a request rejected by the feature gate
pub fn record_feature_denial(feature: &str, plan: &str) {
    counter!("feature_gate_denials_total", "feature" => feature.to_string(), "plan" => plan.to_string()).increment(1);
}

pub fn set_ws_connections(count: usize) {
    gauge!("ws_connections").set(count as f64);
}

/// Record a relayed event by kind (`message`, `typing`)
pub fn record_ws_relay(kind: &'static str) {
    counter!("ws_messages_relayed_total", "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        init_metrics();
        record_cache_hit("dashboard");
        record_cache_miss("dashboard");
        set_cache_size("dashboard", 3);
        record_feature_denial("analytics_dashboard", "free");
        set_ws_connections(2);
        record_ws_relay("message");
    }
}
