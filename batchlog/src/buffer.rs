//! 레벨별 버퍼
//!
//! 레벨마다 독립된 락을 가진 버퍼를 두어, 서로 다른 레벨의 추가와 플러시가
//! 서로를 직렬화하지 않도록 합니다.

use parking_lot::Mutex;

use crate::entry::Entry;
use crate::level::Level;

/// 단일 레벨의 대기 중 항목 버퍼
///
/// 모든 변경(추가, 스냅샷 후 비우기)은 락을 잡은 상태에서만 일어납니다.
#[derive(Debug)]
pub struct LevelBuffer {
    items: Mutex<Vec<Entry>>,
    capacity: usize,
}

impl LevelBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// 플러시 임계값
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 항목 추가
    ///
    /// 추가 후 길이가 용량 이상인지를 락 안에서 계산해 반환합니다.
    pub fn push(&self, entry: Entry) -> bool {
        let mut items = self.items.lock();
        items.push(entry);
        items.len() >= self.capacity
    }

    /// 현재 내용을 꺼내고 버퍼를 비움
    ///
    /// 락은 교체하는 동안만 잡습니다.
    pub fn take(&self) -> Vec<Entry> {
        let mut items = self.items.lock();
        std::mem::replace(&mut *items, Vec::with_capacity(self.capacity))
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// 세 레벨의 버퍼 묶음
#[derive(Debug)]
pub struct LevelBuffers {
    info: LevelBuffer,
    debug: LevelBuffer,
    error: LevelBuffer,
}

impl LevelBuffers {
    pub fn new(capacity: usize) -> Self {
        Self {
            info: LevelBuffer::new(capacity),
            debug: LevelBuffer::new(capacity),
            error: LevelBuffer::new(capacity),
        }
    }

    pub fn get(&self, level: Level) -> &LevelBuffer {
        match level {
            Level::Info => &self.info,
            Level::Debug => &self.debug,
            Level::Error => &self.error,
        }
    }

    /// 세 버퍼에 남아 있는 항목 수 합계
    pub fn pending(&self) -> usize {
        Level::ALL.iter().map(|level| self.get(*level).len()).sum()
    }
}
