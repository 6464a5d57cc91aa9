//! 로그 항목
//!
//! 파이프라인을 흐르는 불변 작업 단위입니다.

use chrono::{DateTime, Local};
use std::fmt::Display;

use crate::level::Level;

/// 로그 파일에 기록되는 타임스탬프 형식
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 수집 큐가 가득 차 호출 스레드에서 직접 기록한 줄에 붙는 표시
pub const FALLBACK_MARKER: &str = "[큐 포화, 호출 스레드에서 직접 기록]";

/// 로그 항목
///
/// 타임스탬프는 기록 메서드가 호출된 순간에 캡처되며,
/// 디스패처가 처리하는 시점과 무관합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    level: Level,
    timestamp: DateTime<Local>,
    payload: Vec<String>,
}

impl Entry {
    /// 현재 시각으로 새 항목 생성
    pub fn new(level: Level, payload: Vec<String>) -> Self {
        Self::with_timestamp(level, Local::now(), payload)
    }

    /// 지정된 시각으로 항목 생성
    pub fn with_timestamp(level: Level, timestamp: DateTime<Local>, payload: Vec<String>) -> Self {
        Self {
            level,
            timestamp,
            payload,
        }
    }

    /// `Display` 값들로부터 항목 생성
    pub fn from_values<I>(level: Level, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        Self::new(level, values.into_iter().map(|v| v.to_string()).collect())
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn payload(&self) -> &[String] {
        &self.payload
    }

    /// `"<timestamp> <공백으로 연결된 payload>"` 형식으로 렌더링
    ///
    /// 끝의 공백은 제거됩니다.
    pub fn render(&self) -> String {
        let mut line = self.timestamp.format(TIME_FORMAT).to_string();
        line.push(' ');
        line.push_str(&self.payload.join(" "));
        line.truncate(line.trim_end().len());
        line
    }

    /// 직접 기록 경로용 렌더링
    pub fn render_fallback(&self) -> String {
        let mut line = self.timestamp.format(TIME_FORMAT).to_string();
        line.push(' ');
        line.push_str(FALLBACK_MARKER);
        line.push(' ');
        line.push_str(&self.payload.join(" "));
        line.truncate(line.trim_end().len());
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 5, 7, 8, 9)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn test_render_format() {
        let entry = Entry::with_timestamp(
            Level::Info,
            fixed_time(),
            vec!["main.rs".to_string(), "server started".to_string()],
        );
        assert_eq!(entry.render(), "2024-03-05 07:08:09.000 main.rs server started");
    }

    #[test]
    fn test_render_trims_trailing_whitespace() {
        let entry = Entry::with_timestamp(
            Level::Debug,
            fixed_time(),
            vec!["value".to_string(), "  \n".to_string()],
        );
        assert_eq!(entry.render(), "2024-03-05 07:08:09.000 value");

        let empty = Entry::with_timestamp(Level::Debug, fixed_time(), Vec::new());
        assert_eq!(empty.render(), "2024-03-05 07:08:09.000");
    }

    #[test]
    fn test_render_fallback_has_marker() {
        let entry = Entry::with_timestamp(Level::Error, fixed_time(), vec!["boom".to_string()]);
        let line = entry.render_fallback();
        assert!(line.starts_with("2024-03-05 07:08:09.000 "));
        assert!(line.contains(FALLBACK_MARKER));
        assert!(line.ends_with(" boom"));
    }

    #[test]
    fn test_from_values_mixed_display() {
        let entry = Entry::from_values(Level::Info, [&"user" as &dyn Display, &42, &1.5]);
        assert_eq!(entry.payload(), &["user", "42", "1.5"]);
        assert_eq!(entry.level(), Level::Info);
    }

    #[test]
    fn test_timestamp_captured_at_creation() {
        let before = Local::now();
        let entry = Entry::new(Level::Info, vec!["x".to_string()]);
        let after = Local::now();
        assert!(entry.timestamp() >= before && entry.timestamp() <= after);
    }
}
