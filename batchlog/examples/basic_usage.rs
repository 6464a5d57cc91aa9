//! 배치 로거 사용 예제
//!
//! `.env` 또는 환경변수(LOG_DIR, LOG_PREFIX, LOG_LEVEL, ...)로 설정을 읽어
//! 로거를 띄우고, 여러 태스크에서 동시에 기록한 뒤 종료합니다.

use anyhow::{Context, Result};
use batchlog::{log_debug, log_error, log_info, Logger, LoggerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // 로거 내부 진단 메시지는 tracing으로 출력
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "batchlog=debug".into()))
        .init();

    let config = LoggerConfig::from_env().context("로거 설정 로드 실패")?;
    println!("로그 디렉토리: {}", config.log_dir.display());

    let logger = Arc::new(Logger::new(config).await.context("로거 생성 실패")?);

    log_info!(logger, "main.rs", "예제 시작");
    log_debug!(logger, "main.rs", "DEBUG 모드");

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let logger = logger.clone();
            tokio::spawn(async move {
                for n in 0..100 {
                    log_info!(logger, "worker", worker, "request", n);
                    if n % 25 == 0 {
                        log_error!(logger, "worker", worker, "slow request", n);
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        })
        .collect();

    for worker in workers {
        worker.await?;
    }

    log_info!(logger, "main.rs", "예제 종료");
    logger.shutdown().await;

    println!("통계: {:?}", logger.stats());
    Ok(())
}
