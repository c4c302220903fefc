//! # Store 模块
//!
//! 资源库接口：把场景 ID 解析为场景定义，并打开场景正文。
//!
//! Runtime 不关心场景来自文件系统还是内存，只通过 [`ResourceStore`] 访问。
//! 文件系统实现位于 host 层；这里提供 [`MemoryStore`] 供无 IO 场合使用。

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::RwLock;
use std::time::Duration;

use crate::error::ResourceError;
use crate::scene::{Achievement, EndCode, SceneDefinition, Story, StoryCode};

/// 资源库 trait
///
/// 会被预加载线程并发调用，因此要求 `Send + Sync`。
pub trait ResourceStore: Send + Sync {
    /// 解析场景 ID
    fn resolve(&self, id: &str) -> Result<SceneDefinition, ResourceError>;

    /// 打开场景正文
    fn open_body(&self, id: &str) -> Result<Box<dyn Read + Send>, ResourceError>;

    /// 全部故事线（按代码排序）
    fn stories(&self) -> Vec<Story> {
        Vec::new()
    }

    /// 查找某个结局对应的成就
    fn achievement(&self, _story: StoryCode, _end: EndCode) -> Option<Achievement> {
        None
    }
}

/// 内存场景条目
#[derive(Debug, Clone)]
struct MemoryEntry {
    definition: SceneDefinition,
    /// `None` 表示正文不可读
    body: Option<String>,
    /// 打开正文前的人为延迟
    latency: Duration,
}

/// 内存资源库
///
/// 用于无头运行和测试。可以为单个场景设置读取延迟，模拟慢速 IO。
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    stories: RwLock<Vec<Story>>,
    achievements: RwLock<Vec<Achievement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加场景及其正文
    pub fn insert(&self, definition: SceneDefinition, body: impl Into<String>) {
        self.insert_entry(definition, Some(body.into()));
    }

    /// 添加正文不可读的场景
    pub fn insert_unreadable(&self, definition: SceneDefinition) {
        self.insert_entry(definition, None);
    }

    fn insert_entry(&self, definition: SceneDefinition, body: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            definition.id.clone(),
            MemoryEntry {
                definition,
                body,
                latency: Duration::ZERO,
            },
        );
    }

    /// 设置打开正文时的延迟
    pub fn set_latency(&self, id: &str, latency: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            entry.latency = latency;
        }
    }

    pub fn add_story(&self, story: Story) {
        let mut stories = self.stories.write().unwrap_or_else(|e| e.into_inner());
        stories.push(story);
        stories.sort_by_key(|s| s.code);
    }

    pub fn add_achievement(&self, achievement: Achievement) {
        let mut achievements = self.achievements.write().unwrap_or_else(|e| e.into_inner());
        achievements.push(achievement);
    }

    /// 全部场景定义（用于诊断）
    pub fn definitions(&self) -> Vec<SceneDefinition> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut defs: Vec<_> = entries.values().map(|e| e.definition.clone()).collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }
}

impl ResourceStore for MemoryStore {
    fn resolve(&self, id: &str) -> Result<SceneDefinition, ResourceError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(id)
            .map(|e| e.definition.clone())
            .ok_or_else(|| ResourceError::NotFound { id: id.to_string() })
    }

    fn open_body(&self, id: &str) -> Result<Box<dyn Read + Send>, ResourceError> {
        let (body, latency) = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let entry = entries
                .get(id)
                .ok_or_else(|| ResourceError::NotFound { id: id.to_string() })?;
            (entry.body.clone(), entry.latency)
        };

        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        match body {
            Some(text) => Ok(Box::new(Cursor::new(text.into_bytes()))),
            None => Err(ResourceError::ReadFailed {
                id: id.to_string(),
                message: "正文不可读".to_string(),
            }),
        }
    }

    fn stories(&self) -> Vec<Story> {
        self.stories.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn achievement(&self, story: StoryCode, end: EndCode) -> Option<Achievement> {
        self.achievements
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.story == story && a.end == end)
            .cloned()
    }
}
