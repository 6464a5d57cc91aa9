//! 로거 에러 타입
//!
//! 생성 시점에 발생하는 에러만 호출자에게 전달됩니다.
//! 로그 기록 호출(`info`/`debug`/`error`)은 절대 에러를 반환하지 않습니다.

use std::path::PathBuf;
use thiserror::Error;

/// 로거 생성 및 설정 에러
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("버퍼 용량은 0보다 커야 함: {0}")]
    InvalidBufferCapacity(usize),

    #[error("수집 큐 용량은 0보다 커야 함: {0}")]
    InvalidQueueCapacity(usize),

    #[error("플러시 간격은 0보다 커야 함")]
    InvalidFlushInterval,

    #[error("잘못된 싱크 설정 ({level}): {message}")]
    InvalidSinkConfig {
        level: &'static str,
        message: String,
    },

    #[error("알 수 없는 로그 레벨: {0}")]
    InvalidLevel(String),

    #[error("로그 디렉토리 생성 또는 접근 실패: {}", path.display())]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("로그 파일 열기 실패: {}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result 타입 별칭
pub type LoggerResult<T> = Result<T, LoggerError>;
