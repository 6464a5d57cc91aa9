//! 파이프라인 통계
//!
//! AtomicU64 카운터로 락 없이 수집합니다.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 원자적 파이프라인 통계
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// 수집 큐에 들어간 항목 수
    pub enqueued: AtomicU64,
    /// 큐가 가득 차 호출 스레드에서 직접 기록한 항목 수
    pub fallback_writes: AtomicU64,
    /// 플러시로 싱크에 기록된 줄 수
    pub flushed_lines: AtomicU64,
    /// 비어 있지 않은 플러시 횟수
    pub flushes: AtomicU64,
    /// 싱크 쓰기/플러시 실패 횟수
    pub sink_errors: AtomicU64,
    /// 종료 이후 버려진 항목 수
    pub discarded: AtomicU64,
}

/// 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub fallback_writes: u64,
    pub flushed_lines: u64,
    pub flushes: u64,
    pub sink_errors: u64,
    pub discarded: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            fallback_writes: self.fallback_writes.load(Ordering::Relaxed),
            flushed_lines: self.flushed_lines.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// 싱크까지 전달된 항목 수 (플러시 + 직접 기록)
    pub fn delivered(&self) -> u64 {
        self.flushed_lines + self.fallback_writes
    }
}
