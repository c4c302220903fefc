//! # Presenter 模块
//!
//! 表现层接口。Runtime 只产生“显示什么”，不关心如何绘制。
//!
//! 文字显示在工作线程中回调，因此 [`Presenter`] 需要 `Send + Sync`。

use std::fmt;
use std::sync::Mutex;

use crate::scene::{Achievement, Choice, EndCode, SceneRef, StoryCode};

/// 提示信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 选项指向的场景无法解析
    BrokenLink { target: SceneRef },
    /// 起始场景无效
    InvalidStart { id: SceneRef },
    /// 没有存档
    NoSave,
    /// 存档写入失败
    SaveFailed { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenLink { target } => write!(f, "选项链接已断开: {}", target),
            Self::InvalidStart { id } => write!(f, "无法从场景 {} 开始", id),
            Self::NoSave => write!(f, "没有可读取的存档"),
            Self::SaveFailed { message } => write!(f, "存档失败: {}", message),
        }
    }
}

/// 表现层 trait
pub trait Presenter: Send + Sync {
    /// 清空文本区和选项区
    fn clear(&self);

    /// 追加显示文本（打字机效果逐字调用）
    fn append_text(&self, text: &str);

    /// 一次性显示完整文本（替换当前内容）
    fn show_text(&self, text: &str);

    /// 显示选项列表和光标
    fn show_choices(&self, choices: &[Choice], cursor: usize);

    /// 显示错误提示
    fn show_error(&self, notice: &Notice);

    /// 到达结局
    fn show_ending(&self, _story: StoryCode, _end: EndCode, _achievement: Option<&Achievement>) {}
}

/// 表现层事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    Clear,
    Append(String),
    Text(String),
    Choices { choices: Vec<Choice>, cursor: usize },
    Error(Notice),
    Ending { story: StoryCode, end: EndCode },
}

/// 记录型表现层
///
/// 无头运行时使用：把所有回调记录成事件序列。
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: PresenterEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// 全部事件快照
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 从最后一次 `Clear` 开始重建当前显示的文本
    pub fn current_text(&self) -> String {
        let events = self.events();
        let start = events
            .iter()
            .rposition(|e| *e == PresenterEvent::Clear)
            .map_or(0, |i| i + 1);
        let mut text = String::new();
        for event in &events[start..] {
            match event {
                PresenterEvent::Append(chunk) => text.push_str(chunk),
                PresenterEvent::Text(full) => {
                    text.clear();
                    text.push_str(full);
                }
                _ => {}
            }
        }
        text
    }

    /// 最后一次显示的错误
    pub fn last_error(&self) -> Option<Notice> {
        self.events().into_iter().rev().find_map(|e| match e {
            PresenterEvent::Error(notice) => Some(notice),
            _ => None,
        })
    }
}

impl Presenter for RecordingPresenter {
    fn clear(&self) {
        self.push(PresenterEvent::Clear);
    }

    fn append_text(&self, text: &str) {
        self.push(PresenterEvent::Append(text.to_string()));
    }

    fn show_text(&self, text: &str) {
        self.push(PresenterEvent::Text(text.to_string()));
    }

    fn show_choices(&self, choices: &[Choice], cursor: usize) {
        self.push(PresenterEvent::Choices {
            choices: choices.to_vec(),
            cursor,
        });
    }

    fn show_error(&self, notice: &Notice) {
        self.push(PresenterEvent::Error(notice.clone()));
    }

    fn show_ending(&self, story: StoryCode, end: EndCode, _achievement: Option<&Achievement>) {
        self.push(PresenterEvent::Ending { story, end });
    }
}
