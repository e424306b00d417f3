//! Per-listener delivery counters

use crate::queue::api::Resolution;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by every worker of one listener
#[derive(Debug, Default)]
pub struct ListenerStats {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    acked: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
    driver_errors: AtomicU64,
    poll_errors: AtomicU64,
}

/// Point-in-time copy of `ListenerStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub acked: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    pub driver_errors: u64,
    pub poll_errors: u64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self, count: usize) {
        self.received.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self, succeeded: bool) {
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_resolution(&self, resolution: Resolution) {
        let counter = match resolution {
            Resolution::Acked => &self.acked,
            Resolution::Requeued => &self.requeued,
            Resolution::DeadLettered => &self.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_driver_error(&self) {
        self.driver_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            driver_errors: self.driver_errors.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
        }
    }
}
