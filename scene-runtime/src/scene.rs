//! # Scene 模块
//!
//! 场景图的数据模型。
//!
//! ## 设计原则
//!
//! - `SceneDefinition` 启动时读入，整个会话内不可变
//! - `LoadedScene` / `LoadedBatch` 每个回合新建，回合结束即丢弃
//! - 取值区间由 newtype 在构造时校验

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RangeError, ResourceError};

/// 场景标识符
pub type SceneRef = String;

/// 正文读取失败时显示的固定文本
pub const BODY_LOAD_ERROR: &str = "Could not load Scene text";

/// 故事代码（'A'..='Z'）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct StoryCode(char);

impl StoryCode {
    pub const MIN: char = 'A';
    pub const MAX: char = 'Z';

    pub fn new(code: char) -> Result<Self, RangeError> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(Self(code))
        } else {
            Err(RangeError::StoryCode(code))
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// 在 'A'..='Z' 中的偏移量
    pub(crate) fn index(self) -> usize {
        (self.0 as u8 - b'A') as usize
    }

    /// 遍历全部 26 个故事代码
    pub fn all() -> impl Iterator<Item = StoryCode> {
        (Self::MIN..=Self::MAX).map(StoryCode)
    }
}

impl TryFrom<char> for StoryCode {
    type Error = RangeError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoryCode> for char {
    fn from(code: StoryCode) -> Self {
        code.0
    }
}

impl fmt::Display for StoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 结局代码（1..=64）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct EndCode(u8);

impl EndCode {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 64;

    pub fn new(code: u32) -> Result<Self, RangeError> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(Self(code as u8))
        } else {
            Err(RangeError::EndCode(code))
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    /// 该结局在完成度位图中对应的位
    pub(crate) fn mask(self) -> u64 {
        1u64 << (self.0 - 1)
    }
}

impl TryFrom<u32> for EndCode {
    type Error = RangeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndCode> for u32 {
    fn from(code: EndCode) -> Self {
        code.get()
    }
}

impl fmt::Display for EndCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// 显示文本
    pub text: String,
    /// 目标场景
    pub target: SceneRef,
}

impl Choice {
    pub fn new(text: impl Into<String>, target: impl Into<SceneRef>) -> Self {
        Self {
            text: text.into(),
            target: target.into(),
        }
    }
}

/// 场景类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneKind {
    /// 无选项的线性场景，不能作为导航终点
    Linear,
    /// 分支场景，选项列表非空
    Choice { choices: Vec<Choice> },
    /// 结局场景
    End { code: EndCode },
}

/// 场景定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDefinition {
    /// 场景 ID
    pub id: SceneRef,
    /// 正文的逻辑路径
    pub body: String,
    #[serde(flatten)]
    pub kind: SceneKind,
}

impl SceneDefinition {
    pub fn choice(id: impl Into<SceneRef>, body: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            kind: SceneKind::Choice { choices },
        }
    }

    pub fn end(id: impl Into<SceneRef>, body: impl Into<String>, code: EndCode) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            kind: SceneKind::End { code },
        }
    }

    pub fn linear(id: impl Into<SceneRef>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            kind: SceneKind::Linear,
        }
    }

    /// 是否可以作为导航目标
    pub fn is_navigable(&self) -> bool {
        !matches!(self.kind, SceneKind::Linear)
    }

    /// 选项列表（非分支场景为空）
    pub fn choices(&self) -> &[Choice] {
        match &self.kind {
            SceneKind::Choice { choices } => choices,
            _ => &[],
        }
    }

    pub fn end_code(&self) -> Option<EndCode> {
        match self.kind {
            SceneKind::End { code } => Some(code),
            _ => None,
        }
    }

    /// 校验数据不变量
    pub fn validate(&self) -> Result<(), ResourceError> {
        if let SceneKind::Choice { choices } = &self.kind
            && choices.is_empty()
        {
            return Err(ResourceError::InvalidFormat {
                id: self.id.clone(),
                message: "分支场景的选项列表不能为空".to_string(),
            });
        }
        Ok(())
    }
}

/// 故事线
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub code: StoryCode,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 起始场景
    pub start: SceneRef,
}

/// 成就（由某个故事的某个结局触发）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub story: StoryCode,
    pub end: EndCode,
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// 已加载正文的场景
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScene {
    pub definition: SceneDefinition,
    /// `None` 表示正文读取失败
    pub text: Option<Arc<str>>,
}

impl LoadedScene {
    pub fn new(definition: SceneDefinition, text: Option<String>) -> Self {
        Self {
            definition,
            text: text.map(Arc::from),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// 实际显示的文本（读取失败时为固定错误文本）
    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or(BODY_LOAD_ERROR)
    }
}

/// 预加载结果，与选项列表按下标一一对应
pub type LoadedBatch = Vec<Option<LoadedScene>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_code_range() {
        assert!(StoryCode::new('A').is_ok());
        assert!(StoryCode::new('Z').is_ok());
        assert_eq!(StoryCode::new('@'), Err(RangeError::StoryCode('@')));
        assert_eq!(StoryCode::new('['), Err(RangeError::StoryCode('[')));
        assert_eq!(StoryCode::all().count(), 26);
    }

    #[test]
    fn test_end_code_range() {
        assert!(EndCode::new(1).is_ok());
        assert!(EndCode::new(64).is_ok());
        assert_eq!(EndCode::new(0), Err(RangeError::EndCode(0)));
        assert_eq!(EndCode::new(65), Err(RangeError::EndCode(65)));
        assert_eq!(EndCode::new(7).unwrap().mask(), 0x40);
        assert_eq!(EndCode::new(64).unwrap().mask(), 1u64 << 63);
    }

    #[test]
    fn test_scene_deserialize() {
        let json = r#"{
            "id": "a.start",
            "body": "start.txt",
            "type": "choice",
            "choices": [{ "text": "Go", "target": "a.next" }]
        }"#;
        let scene: SceneDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(scene.choices().len(), 1);
        assert!(scene.is_navigable());

        let json = r#"{ "id": "a.end", "body": "end.txt", "type": "end", "code": 3 }"#;
        let scene: SceneDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(scene.end_code(), Some(EndCode::new(3).unwrap()));

        let json = r#"{ "id": "a.bad", "body": "bad.txt", "type": "end", "code": 99 }"#;
        assert!(serde_json::from_str::<SceneDefinition>(json).is_err());
    }

    #[test]
    fn test_validate_empty_choices() {
        let scene = SceneDefinition::choice("a.empty", "x.txt", Vec::new());
        assert!(matches!(
            scene.validate(),
            Err(ResourceError::InvalidFormat { .. })
        ));
        assert!(!SceneDefinition::linear("a.l", "l.txt").is_navigable());
    }

    #[test]
    fn test_display_text_fallback() {
        let scene = LoadedScene::new(SceneDefinition::linear("x", "x.txt"), None);
        assert_eq!(scene.display_text(), BODY_LOAD_ERROR);
    }
}
