//! # Terminal Presenter
//!
//! 把 Presenter 回调输出到标准输出。

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use scene_runtime::{Achievement, Choice, EndCode, Notice, Presenter, StoryCode};
use tracing::debug;

/// 选中项前缀
pub const SELECTOR: &str = " > ";
const UNSELECTED: &str = "   ";

/// 渲染选项列表
pub fn render_choice_list(choices: &[Choice], cursor: usize) -> String {
    choices
        .iter()
        .enumerate()
        .map(|(i, choice)| {
            let marker = if i == cursor { SELECTOR } else { UNSELECTED };
            format!("{}{}. {}", marker, i + 1, choice.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 终端表现层
///
/// 终端无法擦除已输出的文字，所以记录本场景已输出的部分，
/// `show_text` 只补齐缺少的后缀。
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    shown: Mutex<String>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn shown(&self) -> MutexGuard<'_, String> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, text: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            debug!(error = %e, "写入终端失败");
        }
    }
}

impl Presenter for TerminalPresenter {
    fn clear(&self) {
        self.shown().clear();
        self.emit("\n");
    }

    fn append_text(&self, text: &str) {
        self.shown().push_str(text);
        self.emit(text);
    }

    fn show_text(&self, text: &str) {
        let mut shown = self.shown();
        let rest = match text.strip_prefix(shown.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("\n{}", text),
        };
        shown.clear();
        shown.push_str(text);
        drop(shown);
        self.emit(&rest);
    }

    fn show_choices(&self, choices: &[Choice], cursor: usize) {
        self.emit(&format!("\n\n{}\n", render_choice_list(choices, cursor)));
    }

    fn show_error(&self, notice: &Notice) {
        self.emit(&format!("\n[!] {}\n", notice));
    }

    fn show_ending(&self, story: StoryCode, end: EndCode, achievement: Option<&Achievement>) {
        let mut text = format!("\n\n== 故事 {} · 结局 {} ==\n", story, end);
        if let Some(achievement) = achievement {
            text.push_str(&format!("成就解锁：{}\n", achievement.title));
            if !achievement.text.is_empty() {
                text.push_str(&achievement.text);
                text.push('\n');
            }
        }
        self.emit(&text);
    }
}
