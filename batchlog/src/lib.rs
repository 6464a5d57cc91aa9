//! 레벨별 배치 비동기 로깅 파이프라인
//!
//! 호출자는 디스크 I/O에 막히지 않고 로그를 남기며, 백그라운드 파이프라인이
//! 레벨별로 항목을 모아 버퍼가 차거나 타이머가 울릴 때 레벨별 파일로 플러시합니다.
//!
//! # 주요 기능
//! - **논블로킹 기록**: 유한 큐에 넣고, 가득 차면 호출 스레드에서 직접 기록
//! - **레벨별 버퍼**: info/debug/error 버퍼가 각자의 락을 가짐
//! - **이중 플러시 조건**: 버퍼 용량 도달 또는 주기적 타이머
//! - **유실 없는 종료**: 큐를 닫고 소진한 뒤 마지막 플러시
//! - **순환 파일 싱크**: 크기 기반 순환, 보관 개수/기간, gzip 압축
//!
//! # 사용 예시
//! ```no_run
//! use batchlog::{log_error, log_info, Level, Logger, LoggerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoggerConfig::new("./logs", "server")
//!         .with_buffer_capacity(20)
//!         .with_flush_interval(Duration::from_secs(10))
//!         .with_min_level(Level::Debug);
//!     let logger = Logger::new(config).await?;
//!
//!     log_info!(logger, "main.rs", "서버 시작", 8080);
//!     log_error!(logger, "main.rs", "연결 실패");
//!
//!     logger.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod entry;
pub mod error;
pub mod level;
pub mod logger;
pub mod pipeline;
pub mod sink;
pub mod stats;

pub use config::{LoggerConfig, SinkConfig};
pub use entry::Entry;
pub use error::{LoggerError, LoggerResult};
pub use level::Level;
pub use logger::{Logger, LoggerState};
pub use pipeline::LevelSinks;
pub use sink::{LineSink, MemorySink, RotatingFileSink};
pub use stats::StatsSnapshot;

#[doc(hidden)]
#[macro_export]
macro_rules! __log_values {
    ($logger:expr, $level:expr $(, $value:expr)* $(,)?) => {{
        let logger = &$logger;
        if logger.enabled($level) {
            logger.log_strings(
                $level,
                ::std::vec::Vec::<::std::string::String>::from([
                    $(::std::string::ToString::to_string(&$value)),*
                ]),
            );
        }
    }};
}

/// 서로 다른 타입의 값들로 DEBUG 로그 기록
#[macro_export]
macro_rules! log_debug {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        $crate::__log_values!($logger, $crate::Level::Debug $(, $value)*)
    };
}

/// 서로 다른 타입의 값들로 INFO 로그 기록
#[macro_export]
macro_rules! log_info {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        $crate::__log_values!($logger, $crate::Level::Info $(, $value)*)
    };
}

/// 서로 다른 타입의 값들로 ERROR 로그 기록
#[macro_export]
macro_rules! log_error {
    ($logger:expr $(, $value:expr)* $(,)?) => {
        $crate::__log_values!($logger, $crate::Level::Error $(, $value)*)
    };
}
