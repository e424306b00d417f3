//! Serde adapters for `Duration` fields in configuration files
//!
//! TOML has no duration type, so settings carry plain integers:
//! `wait_time = 20` (seconds) or `initial_delay = 250` (milliseconds).

use std::time::Duration;
use tokio::time::Instant;

/// Roughly thirty years; stands in for "never" when a deadline overflows
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `Instant::now() + timeout`, clamped to a far-future instant on overflow
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Duration stored as whole seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Duration stored as milliseconds
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct Timings {
        #[serde(with = "super::duration_secs")]
        wait: Duration,
        #[serde(with = "super::duration_millis")]
        delay: Duration,
    }

    #[test]
    fn test_durations_from_toml_integers() {
        let timings: Timings = toml::from_str("wait = 20\ndelay = 250").unwrap();

        assert_eq!(timings.wait, Duration::from_secs(20));
        assert_eq!(timings.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_deadline_after_saturates() {
        let before = tokio::time::Instant::now();
        let near = super::deadline_after(Duration::from_secs(5));
        let far = super::deadline_after(Duration::MAX);

        assert!(near >= before + Duration::from_secs(5));
        assert!(far > near);
        assert!(far >= before + Duration::from_secs(86_400 * 365));
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let result: Result<Timings, _> = toml::from_str("wait = -1\ndelay = 0");
        assert!(result.is_err());
    }
}
