//! 비동기 로거
//!
//! 호출자는 디스크 I/O를 기다리지 않고 항목을 수집 큐에 넣습니다.
//! 백그라운드 디스패처가 큐를 비우며 레벨별 버퍼에 모으고, 버퍼가 가득 차거나
//! 타이머가 울리면 싱크로 플러시합니다.

use parking_lot::{Mutex, RwLock};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::LoggerConfig;
use crate::entry::Entry;
use crate::error::{LoggerError, LoggerResult};
use crate::level::Level;
use crate::pipeline::{LevelSinks, Pipeline};
use crate::stats::{PipelineStats, StatsSnapshot};

/// 로거 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// 실행 중
    Running,
    /// 수집 큐가 닫히고 디스패처가 남은 항목을 소진하는 중
    Draining,
    /// 마지막 플러시 중
    FinalFlush,
    /// 종료됨
    Closed,
}

/// 백그라운드 태스크 핸들
struct BackgroundTasks {
    dispatcher: JoinHandle<()>,
    ticker: JoinHandle<()>,
    ticker_stop: oneshot::Sender<()>,
}

/// 비동기 로거 핸들
///
/// 생성한 쪽이 소유하고, 기록이 필요한 곳에는 참조(또는 `Arc`)로 전달합니다.
/// `shutdown`은 한 번만 실행되며 이후 핸들은 종료 상태가 됩니다.
pub struct Logger {
    pipeline: Arc<Pipeline>,
    /// 수집 큐 송신측 (`None` = 닫힘)
    intake: RwLock<Option<mpsc::Sender<Entry>>>,
    min_level: Level,
    state: RwLock<LoggerState>,
    tasks: Mutex<Option<BackgroundTasks>>,
    shutdown: OnceCell<()>,
}

impl Logger {
    /// 설정에 따라 로그 디렉토리와 레벨별 순환 파일 싱크를 준비하고 로거 시작
    pub async fn new(config: LoggerConfig) -> LoggerResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.log_dir)
            .await
            .map_err(|source| LoggerError::LogDirectory {
                path: config.log_dir.clone(),
                source,
            })?;

        let sinks = LevelSinks::open_files(&config)?;
        Self::with_sinks(config, sinks).await
    }

    /// 주어진 싱크로 로거 시작
    ///
    /// 디스패처와 플러시 타이머를 현재 tokio 런타임에 띄웁니다.
    pub async fn with_sinks(config: LoggerConfig, sinks: LevelSinks) -> LoggerResult<Self> {
        config.validate()?;

        let pipeline = Arc::new(Pipeline::new(config.buffer_capacity, sinks));
        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        // 플러시가 블로킹 파일 I/O를 하므로 블로킹 풀에서 실행
        let dispatcher = {
            let pipeline = pipeline.clone();
            tokio::task::spawn_blocking(move || run_dispatcher(pipeline, receiver))
        };

        let (ticker_stop, stop_rx) = oneshot::channel();
        let ticker = tokio::spawn(run_ticker(pipeline.clone(), config.flush_interval, stop_rx));

        info!(
            log_dir = %config.log_dir.display(),
            min_level = config.min_level.as_str(),
            buffer_capacity = config.buffer_capacity,
            queue_capacity = config.queue_capacity,
            flush_interval = ?config.flush_interval,
            "로거 시작됨"
        );

        Ok(Self {
            pipeline,
            intake: RwLock::new(Some(sender)),
            min_level: config.min_level,
            state: RwLock::new(LoggerState::Running),
            tasks: Mutex::new(Some(BackgroundTasks {
                dispatcher,
                ticker,
                ticker_stop,
            })),
            shutdown: OnceCell::new(),
        })
    }

    /// DEBUG 레벨 로그 기록
    pub fn debug<I>(&self, payload: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.log(Level::Debug, payload);
    }

    /// INFO 레벨 로그 기록
    pub fn info<I>(&self, payload: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.log(Level::Info, payload);
    }

    /// ERROR 레벨 로그 기록 (최소 레벨과 무관하게 항상 기록)
    pub fn error<I>(&self, payload: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.log(Level::Error, payload);
    }

    /// 일반 로그 기록 메서드
    ///
    /// 최소 레벨로 걸러진 뒤, 호출 시각으로 항목을 만들어 큐에 넣습니다.
    /// 큐가 가득 차면 호출 스레드에서 바로 싱크에 기록합니다. 에러는 반환하지 않습니다.
    pub fn log<I>(&self, level: Level, payload: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        if !self.enabled(level) {
            return;
        }
        self.submit(Entry::from_values(level, payload));
    }

    /// 이미 문자열로 렌더링된 값들로 로그 기록
    ///
    /// `log_*!` 매크로가 사용하며, 값을 다시 변환하지 않습니다.
    pub fn log_strings(&self, level: Level, payload: Vec<String>) {
        if !self.enabled(level) {
            return;
        }
        self.submit(Entry::new(level, payload));
    }

    /// 해당 레벨이 최소 레벨에 의해 허용되는지 여부
    pub fn enabled(&self, level: Level) -> bool {
        self.min_level.admits(level)
    }

    fn submit(&self, entry: Entry) {
        let intake = self.intake.read();
        let entry = match intake.as_ref() {
            Some(sender) => match sender.try_send(entry) {
                Ok(()) => {
                    PipelineStats::incr(&self.pipeline.stats().enqueued);
                    return;
                }
                Err(TrySendError::Full(entry)) | Err(TrySendError::Closed(entry)) => entry,
            },
            None => {
                if *self.state.read() == LoggerState::Closed {
                    PipelineStats::incr(&self.pipeline.stats().discarded);
                    debug!(level = entry.level().as_str(), "종료된 로거에 기록 시도, 무시됨");
                    return;
                }
                entry
            }
        };
        drop(intake);

        debug!(level = entry.level().as_str(), "수집 큐 포화, 직접 기록");
        self.pipeline.write_direct(&entry);
    }

    /// 로거 종료
    ///
    /// 수집 큐를 닫고, 디스패처가 남은 항목을 모두 버퍼로 옮길 때까지 기다린 뒤
    /// 세 버퍼를 마지막으로 플러시합니다. 여러 번(동시에) 호출해도 한 번만 실행되며,
    /// 모든 호출은 종료가 끝난 뒤에 반환됩니다.
    pub async fn shutdown(&self) {
        self.shutdown.get_or_init(|| self.run_shutdown()).await;
    }

    async fn run_shutdown(&self) {
        self.set_state(LoggerState::Draining);
        drop(self.intake.write().take());

        let tasks = self.tasks.lock().take();
        if let Some(BackgroundTasks {
            dispatcher,
            ticker,
            ticker_stop,
        }) = tasks
        {
            let _ = ticker_stop.send(());
            if let Err(e) = ticker.await {
                error!(error = %e, "플러시 타이머 종료 실패");
            }
            if let Err(e) = dispatcher.await {
                error!(error = %e, "디스패처 종료 실패");
            }
        }

        self.set_state(LoggerState::FinalFlush);
        let pipeline = self.pipeline.clone();
        match tokio::task::spawn_blocking(move || pipeline.flush_all()).await {
            Ok(lines) => debug!(lines, "마지막 플러시 완료"),
            Err(e) => error!(error = %e, "마지막 플러시 실패"),
        }

        self.set_state(LoggerState::Closed);
        info!(stats = ?self.stats(), "로거 종료됨");
    }

    fn set_state(&self, state: LoggerState) {
        *self.state.write() = state;
    }

    /// 현재 상태
    pub fn state(&self) -> LoggerState {
        *self.state.read()
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats().snapshot()
    }

    /// 버퍼에 남아 있는 항목 수
    pub fn pending(&self) -> usize {
        self.pipeline.buffers().pending()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.shutdown.initialized() {
            return;
        }

        // 큐가 닫히면 디스패처가 남은 항목을 모두 플러시하고 종료함
        self.intake.get_mut().take();
        if let Some(tasks) = self.tasks.get_mut().take() {
            let _ = tasks.ticker_stop.send(());
        }
        warn!("shutdown 호출 없이 로거가 해제됨");
    }
}

/// 디스패처 루프
///
/// 채널이 닫히고 모두 소진될 때까지 항목을 레벨 버퍼로 옮깁니다.
fn run_dispatcher(pipeline: Arc<Pipeline>, mut receiver: mpsc::Receiver<Entry>) {
    debug!("디스패처 시작됨");

    while let Some(entry) = receiver.blocking_recv() {
        pipeline.dispatch(entry);
    }

    let lines = pipeline.flush_all();
    debug!(lines, "디스패처 종료");
}

/// 주기적 플러시 타이머
///
/// 채움 정도와 관계없이 매 틱마다 세 버퍼를 플러시합니다.
async fn run_ticker(pipeline: Arc<Pipeline>, period: Duration, mut stop: oneshot::Receiver<()>) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(period = ?period, "플러시 타이머 시작됨");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let pipeline = pipeline.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || pipeline.flush_all()).await {
                    error!(error = %e, "주기적 플러시 실패");
                }
            }
            _ = &mut stop => break,
        }
    }

    debug!("플러시 타이머 종료");
}
