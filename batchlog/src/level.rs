//! 로그 레벨
//!
//! 레벨은 세 가지뿐이며, 설정된 최소 레벨이 어떤 기록 호출을 허용할지 결정합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LoggerError;

/// 로그 레벨 열거형
///
/// 순서는 `Debug < Info < Error` 입니다. 최소 레벨이 `Debug`이면 모든 호출이,
/// `Info`이면 Info/Error가, `Error`이면 Error만 기록됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// 디버깅 정보
    Debug = 0,
    /// 일반 정보
    Info = 1,
    /// 오류 (항상 기록됨)
    Error = 2,
}

impl Level {
    /// 모든 레벨 (플러시 순서)
    pub const ALL: [Level; 3] = [Level::Info, Level::Debug, Level::Error];

    /// 로그 레벨을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }

    /// 파일 이름에 쓰이는 소문자 이름
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Error => "error",
        }
    }

    /// 이 레벨이 최소 레벨일 때 `level` 호출을 허용하는지 여부
    ///
    /// `Error`는 어떤 최소 레벨에서도 허용됩니다.
    pub fn admits(&self, level: Level) -> bool {
        level >= *self
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "ERROR" => Ok(Level::Error),
            _ => Err(LoggerError::InvalidLevel(s.to_string())),
        }
    }
}
