//! 파이프라인 코어
//!
//! 디스패처와 타이머가 공유하는 상태(레벨별 버퍼, 싱크, 통계)와
//! 플러시 루틴을 담당합니다.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::buffer::LevelBuffers;
use crate::config::LoggerConfig;
use crate::entry::Entry;
use crate::error::LoggerResult;
use crate::level::Level;
use crate::sink::{LineSink, RotatingFileSink};
use crate::stats::PipelineStats;

/// 레벨별 싱크 묶음
#[derive(Clone)]
pub struct LevelSinks {
    info: Arc<dyn LineSink>,
    debug: Arc<dyn LineSink>,
    error: Arc<dyn LineSink>,
}

impl LevelSinks {
    pub fn new(info: Arc<dyn LineSink>, debug: Arc<dyn LineSink>, error: Arc<dyn LineSink>) -> Self {
        Self { info, debug, error }
    }

    /// 설정에 따라 레벨별 순환 파일 싱크를 엶
    ///
    /// 각 줄 앞에는 `"INFO: "`처럼 레벨 접두사가 붙습니다.
    pub fn open_files(config: &LoggerConfig) -> LoggerResult<Self> {
        let open = |level: Level| -> LoggerResult<Arc<dyn LineSink>> {
            let sink = RotatingFileSink::open(
                config.file_path(level),
                config.sink_config(level).clone(),
                format!("{}: ", level.as_str()),
            )?;
            Ok(Arc::new(sink))
        };

        Ok(Self {
            info: open(Level::Info)?,
            debug: open(Level::Debug)?,
            error: open(Level::Error)?,
        })
    }

    pub fn get(&self, level: Level) -> &dyn LineSink {
        match level {
            Level::Info => self.info.as_ref(),
            Level::Debug => self.debug.as_ref(),
            Level::Error => self.error.as_ref(),
        }
    }
}

impl fmt::Debug for LevelSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelSinks").finish_non_exhaustive()
    }
}

/// 디스패처, 타이머, 호출자가 공유하는 파이프라인 상태
#[derive(Debug)]
pub(crate) struct Pipeline {
    buffers: LevelBuffers,
    sinks: LevelSinks,
    stats: PipelineStats,
}

impl Pipeline {
    pub(crate) fn new(buffer_capacity: usize, sinks: LevelSinks) -> Self {
        Self {
            buffers: LevelBuffers::new(buffer_capacity),
            sinks,
            stats: PipelineStats::new(),
        }
    }

    pub(crate) fn buffers(&self) -> &LevelBuffers {
        &self.buffers
    }

    pub(crate) fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// 항목을 레벨 버퍼에 추가하고, 용량에 도달했으면 락 밖에서 플러시
    pub(crate) fn dispatch(&self, entry: Entry) {
        let level = entry.level();
        let reached = self.buffers.get(level).push(entry);
        if reached {
            self.flush(level);
        }
    }

    /// 레벨 버퍼를 비우고 내용을 싱크에 기록
    ///
    /// 버퍼 락은 스냅샷을 꺼내는 동안만 잡으며, 싱크 I/O는 락 밖에서 수행합니다.
    /// 실패한 쓰기는 재시도하지 않습니다.
    pub(crate) fn flush(&self, level: Level) -> usize {
        let batch = self.buffers.get(level).take();
        if batch.is_empty() {
            return 0;
        }

        let sink = self.sinks.get(level);
        let mut written = 0usize;
        let mut failed = 0usize;
        let mut last_error = None;

        for entry in &batch {
            match sink.append_line(&entry.render()) {
                Ok(()) => written += 1,
                Err(e) => {
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if let Err(e) = sink.flush() {
            failed += 1;
            last_error = Some(e);
        }

        PipelineStats::incr(&self.stats.flushes);
        PipelineStats::add(&self.stats.flushed_lines, written as u64);

        if let Some(e) = last_error {
            PipelineStats::add(&self.stats.sink_errors, failed as u64);
            warn!(
                level = level.as_str(),
                failed,
                error = %e,
                "로그 싱크 쓰기 실패"
            );
        }

        debug!(level = level.as_str(), lines = written, "버퍼 플러시 완료");
        written
    }

    /// 세 버퍼를 모두 플러시
    pub(crate) fn flush_all(&self) -> usize {
        Level::ALL.iter().map(|level| self.flush(*level)).sum()
    }

    /// 큐를 거치지 않고 호출 스레드에서 바로 싱크에 기록
    pub(crate) fn write_direct(&self, entry: &Entry) {
        let sink = self.sinks.get(entry.level());
        let result = sink
            .append_line(&entry.render_fallback())
            .and_then(|()| sink.flush());

        match result {
            Ok(()) => PipelineStats::incr(&self.stats.fallback_writes),
            Err(e) => {
                PipelineStats::incr(&self.stats.sink_errors);
                warn!(
                    level = entry.level().as_str(),
                    error = %e,
                    "직접 기록 실패"
                );
            }
        }
    }
}
