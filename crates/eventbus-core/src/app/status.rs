//! Status - Bus の観測用カウンタ

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// `Bus::stats()` のスナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// queue に入った message
    pub sent: u64,
    /// handler が一つ以上見つかった message
    pub dispatched: u64,
    /// handler が無く捨てられた message
    pub unrouted: u64,
    /// 起動した handler 呼び出し
    pub invocations: u64,
    pub failed: u64,
    pub panicked: u64,
}

/// `Bus::shutdown()` の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// shutdown 要求後に queue から取り出して dispatch した message
    pub drained: u64,
    /// `drain_on_shutdown = false` で捨てた message
    pub discarded: u64,
    /// timeout で abort した handler 呼び出し
    pub aborted: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) sent: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) unrouted: AtomicU64,
    pub(crate) invocations: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) panicked: AtomicU64,
}

impl Counters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            sent: self.sent.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}
