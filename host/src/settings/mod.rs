//! # Settings 模块
//!
//! 键值对设置文件，实现 [`Persistence`]。
//!
//! ## 文件格式
//!
//! ```json
//! {
//!   "textSpeedMultiplier": "2",
//!   "save": "a.forest",
//!   "reachedEndingsA": "68"
//! }
//! ```
//!
//! 每次修改都会同步写回整个文件。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use scene_runtime::{Persistence, SceneRef, StorageError, StoryCode, TextSpeed};
use tracing::{debug, info, warn};

pub const TEXT_SPEED_KEY: &str = "textSpeedMultiplier";
pub const SAVE_KEY: &str = "save";
pub const ENDINGS_KEY_PREFIX: &str = "reachedEndings";

/// 某个故事的结局位图键名
pub fn endings_key(story: StoryCode) -> String {
    format!("{}{}", ENDINGS_KEY_PREFIX, story)
}

/// 设置文件
#[derive(Debug)]
pub struct SettingsFile {
    path: PathBuf,
    default_speed: TextSpeed,
    values: Mutex<BTreeMap<String, String>>,
}

impl SettingsFile {
    /// 打开设置文件
    ///
    /// 文件不存在时从空设置开始；文件存在但无法解析时返回错误，避免覆盖已有进度。
    pub fn open(path: impl AsRef<Path>, default_speed: TextSpeed) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StorageError::Io(e.to_string()))?;
            let values: BTreeMap<String, String> = serde_json::from_str(&content)
                .map_err(|e| StorageError::Serialize(e.to_string()))?;
            info!(path = %path.display(), keys = values.len(), "设置文件加载成功");
            values
        } else {
            info!(path = %path.display(), "设置文件不存在，使用默认设置");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            default_speed,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// 修改并立即写回文件
    fn update(&self, key: &str, value: Option<String>) -> Result<(), StorageError> {
        let mut values = self.lock();
        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };

        let json = serde_json::to_string_pretty(&*values)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        fs::write(&self.path, json).map_err(|e| StorageError::Io(e.to_string()))?;
        debug!(key = %key, "设置已写回");
        Ok(())
    }
}

impl Persistence for SettingsFile {
    fn text_speed(&self) -> TextSpeed {
        let Some(raw) = self.get(TEXT_SPEED_KEY) else {
            return self.default_speed;
        };
        match raw.trim().parse::<u32>().ok().map(TextSpeed::new) {
            Some(Ok(speed)) => speed,
            _ => {
                warn!(value = %raw, "文字速度设置无效，使用默认值");
                self.default_speed
            }
        }
    }

    fn set_text_speed(&self, speed: TextSpeed) -> Result<(), StorageError> {
        self.update(TEXT_SPEED_KEY, Some(speed.get().to_string()))
    }

    fn save_pointer(&self) -> Option<SceneRef> {
        self.get(SAVE_KEY).filter(|pointer| !pointer.is_empty())
    }

    fn set_save_pointer(&self, pointer: Option<&str>) -> Result<(), StorageError> {
        self.update(SAVE_KEY, pointer.map(str::to_string))
    }

    fn ending_bitmask(&self, story: StoryCode) -> u64 {
        let key = endings_key(story);
        let Some(raw) = self.get(&key) else {
            return 0;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "结局进度无效，按未开始处理");
            0
        })
    }

    fn set_ending_bitmask(&self, story: StoryCode, mask: u64) -> Result<(), StorageError> {
        self.update(&endings_key(story), Some(mask.to_string()))
    }
}
