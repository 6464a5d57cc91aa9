//! 로그 싱크
//!
//! 파이프라인은 "한 줄 추가" 계약만 사용합니다. 파일 순환, 보관 개수,
//! 보관 기간, 압축은 모두 싱크 내부 책임입니다.
//! 보관 정리와 압축은 싱크마다 하나씩 있는 백그라운드 스레드에서 실행되므로
//! `append_line`은 순환 시에도 파일 이름 변경 이상을 기다리지 않습니다.

use chrono::{Local, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::{Condvar, Mutex};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::SinkConfig;
use crate::error::{LoggerError, LoggerResult};

/// 플랫폼별 줄 끝 문자
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// 백업 파일 이름에 들어가는 시각 형식 (`2024-03-05T07-08-09.000`)
const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const BACKUP_TIME_LEN: usize = 23;

/// 렌더링된 한 줄을 받아 기록하는 대상
///
/// 구현체는 자기 쓰기를 스스로 직렬화해야 합니다.
pub trait LineSink: Send + Sync {
    /// 한 줄 추가 (줄 끝 문자는 싱크가 붙임)
    fn append_line(&self, line: &str) -> io::Result<()>;

    /// 버퍼링된 내용을 내보냄
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// 크기 기반 순환 파일 싱크
pub struct RotatingFileSink {
    path: PathBuf,
    config: SinkConfig,
    line_prefix: String,
    state: Mutex<FileState>,
    mill: Arc<BackupMill>,
    mill_signal: SyncSender<()>,
}

struct FileState {
    writer: Option<BufWriter<File>>,
    size: u64,
    /// 마지막 백업의 (시각 문자열, 순번)
    last_backup: Option<(String, u32)>,
}

/// 백업 정리기
///
/// 순환 요청을 받을 때마다 보관 개수/기간 초과 백업을 지우고 남은 백업을 압축합니다.
struct BackupMill {
    path: PathBuf,
    config: SinkConfig,
    /// 지금까지 들어온 정리 요청 수
    requested: AtomicU64,
    /// 정리가 반영된 요청 수 (정리 중에는 잠겨 있음)
    completed: Mutex<u64>,
    done: Condvar,
}

/// 디렉토리에서 찾은 백업 파일
#[derive(Debug, Clone)]
struct Backup {
    path: PathBuf,
    time: NaiveDateTime,
    seq: u32,
    compressed: bool,
}

impl RotatingFileSink {
    /// 파일을 추가 모드로 열고 현재 크기를 기록
    pub fn open<P: AsRef<Path>, S: Into<String>>(
        path: P,
        config: SinkConfig,
        line_prefix: S,
    ) -> LoggerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (file, size) = open_append(&path).map_err(|source| LoggerError::SinkOpen {
            path: path.clone(),
            source,
        })?;

        let mill = Arc::new(BackupMill::new(path.clone(), config.clone()));
        let (mill_signal, requests) = mpsc::sync_channel(1);
        {
            let mill = mill.clone();
            thread::Builder::new()
                .name("batchlog-backup-mill".to_string())
                .spawn(move || mill.run(requests))
                .map_err(|source| LoggerError::SinkOpen {
                    path: path.clone(),
                    source,
                })?;
        }

        debug!(path = %path.display(), size, "로그 싱크 열림");

        Ok(Self {
            path,
            config,
            line_prefix: line_prefix.into(),
            state: Mutex::new(FileState {
                writer: Some(BufWriter::new(file)),
                size,
                last_backup: None,
            }),
            mill,
            mill_signal,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 파일에 기록된 바이트 수
    pub fn current_size(&self) -> u64 {
        self.state.lock().size
    }

    /// 현재 파일을 백업으로 돌리고 새 파일을 엶
    fn rotate(&self, state: &mut FileState) -> io::Result<()> {
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }

        let backup = self.backup_path(state);
        if let Err(e) = fs::rename(&self.path, &backup) {
            // 이름 변경 실패 시 기존 파일에 계속 기록
            let (file, size) = open_append(&self.path)?;
            state.writer = Some(BufWriter::new(file));
            state.size = size;
            return Err(e);
        }

        let (file, size) = open_append(&self.path)?;
        state.writer = Some(BufWriter::new(file));
        state.size = size;

        debug!(
            path = %self.path.display(),
            backup = %backup.display(),
            "로그 파일 순환 완료"
        );

        self.request_cleanup();
        Ok(())
    }

    /// 백업 정리를 백그라운드 스레드에 요청 (대기하지 않음)
    fn request_cleanup(&self) {
        self.mill.requested.fetch_add(1, Ordering::SeqCst);
        match self.mill_signal.try_send(()) {
            // 이미 대기 중인 요청이 이번 요청까지 처리함
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                warn!(path = %self.path.display(), "백업 정리 스레드가 종료되어 정리 생략");
            }
        }
    }

    /// 지금까지 요청된 백업 정리가 끝날 때까지 최대 `timeout` 동안 대기
    ///
    /// 시간 안에 끝나면 `true`를 반환합니다.
    pub fn wait_for_cleanup(&self, timeout: Duration) -> bool {
        let target = self.mill.requested.load(Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        let mut completed = self.mill.completed.lock();
        while *completed < target {
            if self.mill.done.wait_until(&mut completed, deadline).timed_out() {
                return *completed >= target;
            }
        }
        true
    }

    /// 겹치지 않는 백업 파일 경로 생성
    ///
    /// 같은 밀리초 안의 순환은 순번이 계속 증가합니다.
    fn backup_path(&self, state: &mut FileState) -> PathBuf {
        let (stem, ext) = self.mill.name_parts();
        let dir = self.mill.dir();
        let stamp = Local::now().format(BACKUP_TIME_FORMAT).to_string();

        let mut seq = match &state.last_backup {
            Some((last, last_seq)) if *last == stamp => last_seq + 1,
            _ => 0,
        };
        loop {
            let name = if seq == 0 {
                format!("{stem}-{stamp}{ext}")
            } else {
                format!("{stem}-{stamp}-{seq}{ext}")
            };
            let candidate = dir.join(&name);
            if !candidate.exists() && !dir.join(format!("{name}.gz")).exists() {
                state.last_backup = Some((stamp, seq));
                return candidate;
            }
            seq += 1;
        }
    }
}

impl BackupMill {
    fn new(path: PathBuf, config: SinkConfig) -> Self {
        Self {
            path,
            config,
            requested: AtomicU64::new(0),
            completed: Mutex::new(0),
            done: Condvar::new(),
        }
    }

    /// 요청 채널이 닫힐 때까지 정리 요청 처리
    fn run(&self, requests: Receiver<()>) {
        while requests.recv().is_ok() {
            let target = self.requested.load(Ordering::SeqCst);
            let mut completed = self.completed.lock();
            if let Err(e) = self.cleanup_backups() {
                warn!(path = %self.path.display(), error = %e, "백업 파일 정리 실패");
            }
            *completed = target;
            drop(completed);
            self.done.notify_all();
        }
        debug!(path = %self.path.display(), "백업 정리 스레드 종료");
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (stem, ext)
    }

    /// 최신순으로 정렬된 백업 목록
    fn list_backups(&self) -> io::Result<Vec<Backup>> {
        let (stem, ext) = self.name_parts();
        let prefix = format!("{stem}-");
        let gz_ext = format!("{ext}.gz");

        let mut backups = Vec::new();
        for dir_entry in fs::read_dir(self.dir())? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };

            let (rest, compressed) = if let Some(rest) = rest.strip_suffix(&gz_ext) {
                (rest, true)
            } else if let Some(rest) = rest.strip_suffix(&ext) {
                (rest, false)
            } else {
                continue;
            };

            if rest.len() < BACKUP_TIME_LEN || !rest.is_char_boundary(BACKUP_TIME_LEN) {
                continue;
            }
            let (stamp, tail) = rest.split_at(BACKUP_TIME_LEN);
            let Ok(time) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) else {
                continue;
            };
            let seq = match tail.strip_prefix('-') {
                Some(n) => match n.parse() {
                    Ok(n) => n,
                    Err(_) => continue,
                },
                None if tail.is_empty() => 0,
                None => continue,
            };

            backups.push(Backup {
                path: dir_entry.path(),
                time,
                seq,
                compressed,
            });
        }

        backups.sort_by(|a, b| (b.time, b.seq).cmp(&(a.time, a.seq)));
        Ok(backups)
    }

    /// 보관 개수/기간 초과 백업 삭제 후 남은 백업 압축
    fn cleanup_backups(&self) -> io::Result<()> {
        let mut backups = self.list_backups()?;
        let mut expired = Vec::new();

        if self.config.max_backups > 0 && backups.len() > self.config.max_backups {
            expired.extend(backups.split_off(self.config.max_backups));
        }

        if self.config.max_age_days > 0 {
            match retention_cutoff(self.config.max_age_days) {
                Some(cutoff) => backups.retain(|backup| {
                    if backup.time < cutoff {
                        expired.push(backup.clone());
                        false
                    } else {
                        true
                    }
                }),
                None => debug!(
                    max_age_days = self.config.max_age_days,
                    "보관 기간이 표현 범위를 넘어 기간 정리 생략"
                ),
            }
        }

        for backup in &expired {
            match fs::remove_file(&backup.path) {
                Ok(()) => debug!(path = %backup.path.display(), "오래된 로그 백업 삭제됨"),
                Err(e) => warn!(
                    path = %backup.path.display(),
                    error = %e,
                    "로그 백업 삭제 실패"
                ),
            }
        }

        if self.config.compress {
            for backup in backups.iter().filter(|b| !b.compressed) {
                if let Err(e) = compress_file(&backup.path) {
                    warn!(path = %backup.path.display(), error = %e, "로그 백업 압축 실패");
                }
            }
        }

        Ok(())
    }
}

impl FileState {
    fn writer(&mut self, path: &Path) -> io::Result<&mut BufWriter<File>> {
        if self.writer.is_none() {
            let (file, size) = open_append(path)?;
            self.writer = Some(BufWriter::new(file));
            self.size = size;
        }
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "로그 파일이 열려 있지 않음"))
    }
}

impl LineSink for RotatingFileSink {
    fn append_line(&self, line: &str) -> io::Result<()> {
        let len = (self.line_prefix.len() + line.len() + LINE_ENDING.len()) as u64;
        let mut state = self.state.lock();

        if state.size > 0 && state.size + len > self.config.max_size_bytes {
            self.rotate(&mut state)?;
        }

        let writer = state.writer(&self.path)?;
        writer.write_all(self.line_prefix.as_bytes())?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(LINE_ENDING.as_bytes())?;
        state.size += len;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        match state.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// 보관 기간 기준 시각 (표현 범위를 넘으면 `None`)
fn retention_cutoff(max_age_days: u32) -> Option<NaiveDateTime> {
    let age = chrono::Duration::try_days(i64::from(max_age_days))?;
    Local::now().naive_local().checked_sub_signed(age)
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

/// `<path>.gz`로 압축한 뒤 원본 삭제
fn compress_file(src: &Path) -> io::Result<()> {
    let mut dst_name: OsString = src.as_os_str().to_owned();
    dst_name.push(".gz");
    let dst = PathBuf::from(dst_name);

    if let Err(e) = gzip_into(src, &dst) {
        let _ = fs::remove_file(&dst);
        return Err(e);
    }

    fs::remove_file(src)?;
    debug!(path = %dst.display(), "로그 백업 압축 완료");
    Ok(())
}

fn gzip_into(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let output = File::create(dst)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()
}

/// 메모리 내 싱크 (테스트 및 임베딩용)
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 모든 줄 반환
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LineSink for MemorySink {
    fn append_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config(max_size_bytes: u64) -> SinkConfig {
        SinkConfig {
            max_size_bytes,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
        }
    }

    fn backup_count(dir: &Path, stem: &str) -> usize {
        fs::read_dir(dir)
            .expect("Test assertion failed")
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.starts_with(&format!("{stem}-"))
            })
            .count()
    }

    #[test]
    fn test_append_writes_prefixed_lines() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_info.log");
        let sink = RotatingFileSink::open(&path, test_config(1024 * 1024), "INFO: ")
            .expect("Test assertion failed");

        sink.append_line("first").expect("Test assertion failed");
        sink.append_line("second").expect("Test assertion failed");
        sink.flush().expect("Test assertion failed");

        let content = fs::read_to_string(&path).expect("Test assertion failed");
        assert_eq!(content, format!("INFO: first{LINE_ENDING}INFO: second{LINE_ENDING}"));
    }

    #[test]
    fn test_open_fails_for_missing_directory() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("missing").join("app_info.log");
        let result = RotatingFileSink::open(&path, test_config(1024), "");
        assert!(matches!(result, Err(LoggerError::SinkOpen { .. })));
    }

    #[test]
    fn test_reopen_keeps_existing_size() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_debug.log");
        fs::write(&path, "existing\n").expect("Test assertion failed");

        let sink = RotatingFileSink::open(&path, test_config(1024), "").expect("Test assertion failed");
        assert_eq!(sink.current_size(), 9);
    }

    #[test]
    fn test_rotation_on_size_limit() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_info.log");
        // 한 줄 = 10 바이트 (9 + 줄 끝), 두 줄까지 허용
        let line = "x".repeat(10 - LINE_ENDING.len());
        let sink = RotatingFileSink::open(&path, test_config(20), "").expect("Test assertion failed");

        for _ in 0..5 {
            sink.append_line(&line).expect("Test assertion failed");
        }
        sink.flush().expect("Test assertion failed");

        // 2 + 2 + 1 => 백업 2개, 현재 파일 1줄
        assert_eq!(backup_count(temp_dir.path(), "app_info"), 2);
        assert_eq!(sink.current_size(), 10);
        let current = fs::read_to_string(&path).expect("Test assertion failed");
        assert_eq!(current.lines().count(), 1);
    }

    #[test]
    fn test_max_backups_enforced() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_error.log");
        let config = SinkConfig {
            max_backups: 2,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");

        for n in 0..6 {
            sink.append_line(&format!("line-{n}")).expect("Test assertion failed");
        }
        sink.flush().expect("Test assertion failed");
        assert!(sink.wait_for_cleanup(WAIT));

        assert_eq!(backup_count(temp_dir.path(), "app_error"), 2);

        // 가장 최근 백업만 남아야 함
        let mut kept: Vec<String> = sink
            .mill
            .list_backups()
            .expect("Test assertion failed")
            .iter()
            .map(|b| fs::read_to_string(&b.path).expect("Test assertion failed"))
            .collect();
        kept.sort();
        assert_eq!(
            kept,
            vec![
                format!("line-3{LINE_ENDING}"),
                format!("line-4{LINE_ENDING}")
            ]
        );
    }

    #[test]
    fn test_max_age_removes_old_backups() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_info.log");
        let old_backup = temp_dir.path().join("app_info-2000-01-01T00-00-00.000.log");
        fs::write(&old_backup, "old\n").expect("Test assertion failed");

        let config = SinkConfig {
            max_age_days: 1,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");
        sink.append_line("aaaaa").expect("Test assertion failed");
        sink.append_line("bbbbb").expect("Test assertion failed");
        assert!(sink.wait_for_cleanup(WAIT));

        assert!(!old_backup.exists());
        assert_eq!(backup_count(temp_dir.path(), "app_info"), 1);
    }

    #[test]
    fn test_rotated_backup_is_compressed() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_debug.log");
        let config = SinkConfig {
            compress: true,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");
        sink.append_line("first").expect("Test assertion failed");
        sink.append_line("second").expect("Test assertion failed");
        assert!(sink.wait_for_cleanup(WAIT));

        let backups = sink.mill.list_backups().expect("Test assertion failed");
        assert_eq!(backups.len(), 1);
        assert!(backups[0].compressed);
        assert!(backups[0].path.to_string_lossy().ends_with(".log.gz"));

        let mut decoded = String::new();
        GzDecoder::new(File::open(&backups[0].path).expect("Test assertion failed"))
            .read_to_string(&mut decoded)
            .expect("Test assertion failed");
        assert_eq!(decoded, format!("first{LINE_ENDING}"));
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_info.log");
        let other = temp_dir.path().join("app_info-notes.log");
        fs::write(&other, "keep\n").expect("Test assertion failed");

        let config = SinkConfig {
            max_backups: 1,
            max_age_days: 1,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");
        for n in 0..4 {
            sink.append_line(&format!("l{n}")).expect("Test assertion failed");
        }
        assert!(sink.wait_for_cleanup(WAIT));

        assert!(other.exists());
        assert_eq!(sink.mill.list_backups().expect("Test assertion failed").len(), 1);
    }

    #[test]
    fn test_append_does_not_wait_for_compression() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_error.log");
        let config = SinkConfig {
            compress: true,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");

        // 정리 스레드를 붙잡아 둔 상태에서도 순환과 기록은 끝나야 함
        let held = sink.mill.completed.lock();
        sink.append_line("first").expect("Test assertion failed");
        sink.append_line("second").expect("Test assertion failed");
        sink.append_line("third").expect("Test assertion failed");

        let backups = sink.mill.list_backups().expect("Test assertion failed");
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().all(|b| !b.compressed));
        assert_eq!(sink.mill.requested.load(Ordering::SeqCst), 2);
        assert_eq!(*held, 0);

        drop(held);
        assert!(sink.wait_for_cleanup(WAIT));
        let backups = sink.mill.list_backups().expect("Test assertion failed");
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().all(|b| b.compressed));
    }

    #[test]
    fn test_huge_max_age_keeps_backups() {
        let temp_dir = TempDir::new().expect("Test assertion failed");
        let path = temp_dir.path().join("app_error.log");
        let old_backup = temp_dir.path().join("app_error-2000-01-01T00-00-00.000.log");
        fs::write(&old_backup, "old\n").expect("Test assertion failed");

        let config = SinkConfig {
            max_age_days: u32::MAX,
            ..test_config(8)
        };
        let sink = RotatingFileSink::open(&path, config, "").expect("Test assertion failed");
        for n in 0..4 {
            sink.append_line(&format!("line-{n}")).expect("Test assertion failed");
        }
        assert!(sink.wait_for_cleanup(WAIT));

        assert!(old_backup.exists());
        assert_eq!(sink.mill.list_backups().expect("Test assertion failed").len(), 4);
    }

    #[test]
    fn test_retention_cutoff_bounds() {
        let cutoff = retention_cutoff(1).expect("Test assertion failed");
        assert!(cutoff < Local::now().naive_local());
        assert!(retention_cutoff(u32::MAX).is_none());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.append_line("a").expect("Test assertion failed");
        sink.append_line("b").expect("Test assertion failed");
        assert_eq!(sink.lines(), vec!["a", "b"]);
        assert_eq!(sink.len(), 2);

        sink.clear();
        assert!(sink.is_empty());
    }
}
