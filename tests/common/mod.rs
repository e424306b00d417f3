//! Common test utilities and helpers
//!
//! Shared fixtures for the integration tests: payload builders, a fast
//! manager configuration and polling helpers.

#![allow(dead_code)]

use joblistener::listener::api::ManagerConfig;
use joblistener::queue::api::MessageBody;
use serde_json::Value;
use std::time::Duration;

/// Manager settings tuned for tests: short polls and a quick shutdown
pub fn fast_config() -> ManagerConfig {
    ManagerConfig::default()
        .wait_time(Duration::from_millis(20))
        .shutdown_timeout(Duration::from_secs(2))
}

/// Build a message body from a JSON object literal
pub fn body(value: Value) -> MessageBody {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = MessageBody::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Poll `condition` every 10ms for up to `limit`
pub async fn wait_for<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
