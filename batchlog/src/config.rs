//! 로거 설정 관리
//!
//! 생성 시점 설정과 레벨별 싱크 설정을 담당합니다.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LoggerError, LoggerResult};
use crate::level::Level;

/// 백업 보관 일수 상한 (100년)
pub const MAX_AGE_DAYS_LIMIT: u32 = 36_500;

/// 레벨별 순환 파일 싱크 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// 순환 전 최대 파일 크기 (바이트)
    pub max_size_bytes: u64,

    /// 최대 백업 개수 (0 = 무제한)
    pub max_backups: usize,

    /// 백업 보관 일수 (0 = 무제한)
    pub max_age_days: u32,

    /// 순환된 백업 gzip 압축 여부
    pub compress: bool,
}

impl SinkConfig {
    /// 레벨별 기본값 (보관 일수만 다름: info 1일, debug 10일, error 30일)
    pub fn for_level(level: Level) -> Self {
        let max_age_days = match level {
            Level::Info => 1,
            Level::Debug => 10,
            Level::Error => 30,
        };

        Self {
            max_size_bytes: 50 * 1024 * 1024, // 50MB
            max_backups: 365,
            max_age_days,
            compress: true,
        }
    }
}

/// 로거 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// 로그 디렉토리 (없으면 생성)
    pub log_dir: PathBuf,

    /// 파일 이름 접두사 (`<prefix>_info.log` 등)
    pub file_prefix: String,

    /// 레벨별 버퍼의 크기 기반 플러시 임계값
    pub buffer_capacity: usize,

    /// 무조건 플러시 간격
    pub flush_interval: Duration,

    /// 최소 로그 레벨
    pub min_level: Level,

    /// 수집 큐 크기 (기본값: 5000)
    pub queue_capacity: usize,

    pub info_sink: SinkConfig,
    pub debug_sink: SinkConfig,
    pub error_sink: SinkConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_prefix: "app".to_string(),
            buffer_capacity: 20,
            flush_interval: Duration::from_secs(10),
            min_level: Level::Info,
            queue_capacity: 5000,
            info_sink: SinkConfig::for_level(Level::Info),
            debug_sink: SinkConfig::for_level(Level::Debug),
            error_sink: SinkConfig::for_level(Level::Error),
        }
    }
}

impl LoggerConfig {
    pub fn new<P: AsRef<Path>, S: Into<String>>(log_dir: P, file_prefix: S) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            file_prefix: file_prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn sink_config(&self, level: Level) -> &SinkConfig {
        match level {
            Level::Info => &self.info_sink,
            Level::Debug => &self.debug_sink,
            Level::Error => &self.error_sink,
        }
    }

    /// 레벨별 로그 파일 경로
    pub fn file_path(&self, level: Level) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}.log", self.file_prefix, level.file_suffix()))
    }

    /// 환경변수에서 설정 로드
    ///
    /// 설정되지 않은 값은 기본값을 사용하며, 파싱할 수 없는 값은 에러입니다.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LOG_PREFIX") {
            config.file_prefix = val;
        }

        if let Ok(val) = std::env::var("LOG_LEVEL") {
            config.min_level = val.parse().context("LOG_LEVEL 파싱 실패")?;
        }

        if let Ok(val) = std::env::var("LOG_BUFFER_SIZE") {
            config.buffer_capacity = val.parse().context("LOG_BUFFER_SIZE 파싱 실패")?;
        }

        if let Ok(val) = std::env::var("LOG_FLUSH_INTERVAL") {
            let secs: u64 = val.parse().context("LOG_FLUSH_INTERVAL 파싱 실패")?;
            config.flush_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("LOG_QUEUE_SIZE") {
            config.queue_capacity = val.parse().context("LOG_QUEUE_SIZE 파싱 실패")?;
        }

        if let Ok(val) = std::env::var("LOG_MAX_FILE_SIZE") {
            let size: u64 = val.parse().context("LOG_MAX_FILE_SIZE 파싱 실패")?;
            for sink in config.sinks_mut() {
                sink.max_size_bytes = size;
            }
        }

        if let Ok(val) = std::env::var("LOG_MAX_BACKUPS") {
            let backups: usize = val.parse().context("LOG_MAX_BACKUPS 파싱 실패")?;
            for sink in config.sinks_mut() {
                sink.max_backups = backups;
            }
        }

        if let Ok(val) = std::env::var("LOG_ENABLE_COMPRESSION") {
            let compress = val.to_lowercase() == "true";
            for sink in config.sinks_mut() {
                sink.compress = compress;
            }
        }

        Ok(config)
    }

    fn sinks_mut(&mut self) -> [&mut SinkConfig; 3] {
        [&mut self.info_sink, &mut self.debug_sink, &mut self.error_sink]
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> LoggerResult<()> {
        if self.buffer_capacity == 0 {
            return Err(LoggerError::InvalidBufferCapacity(self.buffer_capacity));
        }

        if self.queue_capacity == 0 {
            return Err(LoggerError::InvalidQueueCapacity(self.queue_capacity));
        }

        if self.flush_interval.is_zero() {
            return Err(LoggerError::InvalidFlushInterval);
        }

        for level in Level::ALL {
            let sink = self.sink_config(level);
            if sink.max_size_bytes == 0 {
                return Err(LoggerError::InvalidSinkConfig {
                    level: level.as_str(),
                    message: "max_size_bytes must be greater than 0".to_string(),
                });
            }
            if sink.max_age_days > MAX_AGE_DAYS_LIMIT {
                return Err(LoggerError::InvalidSinkConfig {
                    level: level.as_str(),
                    message: format!(
                        "max_age_days must be at most {MAX_AGE_DAYS_LIMIT}, got {}",
                        sink.max_age_days
                    ),
                });
            }
        }

        Ok(())
    }
}
