//! # Persistence 模块
//!
//! 持久化服务接口：文字速度、存档指针、每个故事的结局位图。
//!
//! 存储形式是扁平的键值对（每个故事一个位图键、一个速度键、一个存档键），
//! 具体落盘方式由 host 层决定。

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{RangeError, StorageError};
use crate::scene::{SceneRef, StoryCode};

/// 文字速度倍率（1..=16）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TextSpeed(u8);

impl TextSpeed {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 16;

    pub fn new(value: u32) -> Result<Self, RangeError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RangeError::TextSpeed(value))
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for TextSpeed {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u32> for TextSpeed {
    type Error = RangeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TextSpeed> for u32 {
    fn from(speed: TextSpeed) -> Self {
        speed.get()
    }
}

/// 持久化服务 trait
///
/// 所有写操作都是同步的：返回 `Ok` 即表示已经落盘。
pub trait Persistence: Send + Sync {
    fn text_speed(&self) -> TextSpeed;

    fn set_text_speed(&self, speed: TextSpeed) -> Result<(), StorageError>;

    /// 存档指针（最后保存的场景 ID）
    fn save_pointer(&self) -> Option<SceneRef>;

    /// 设置或清除存档指针
    fn set_save_pointer(&self, pointer: Option<&str>) -> Result<(), StorageError>;

    /// 某个故事的结局位图，从未写入时为 0
    fn ending_bitmask(&self, story: StoryCode) -> u64;

    fn set_ending_bitmask(&self, story: StoryCode, mask: u64) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    speed: TextSpeed,
    save: Option<SceneRef>,
    endings: HashMap<StoryCode, u64>,
    writes: usize,
}

/// 内存持久化
///
/// 记录写入次数，便于检查“每次修改都同步写入”。
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    state: Mutex<MemoryState>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed(speed: TextSpeed) -> Self {
        let persistence = Self::default();
        persistence.lock().speed = speed;
        persistence
    }

    /// 累计写入次数
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Persistence for MemoryPersistence {
    fn text_speed(&self) -> TextSpeed {
        self.lock().speed
    }

    fn set_text_speed(&self, speed: TextSpeed) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.speed = speed;
        state.writes += 1;
        Ok(())
    }

    fn save_pointer(&self) -> Option<SceneRef> {
        self.lock().save.clone()
    }

    fn set_save_pointer(&self, pointer: Option<&str>) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.save = pointer.map(str::to_string);
        state.writes += 1;
        Ok(())
    }

    fn ending_bitmask(&self, story: StoryCode) -> u64 {
        self.lock().endings.get(&story).copied().unwrap_or(0)
    }

    fn set_ending_bitmask(&self, story: StoryCode, mask: u64) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.endings.insert(story, mask);
        state.writes += 1;
        Ok(())
    }
}
