//! # 诊断模块
//!
//! 场景图静态检查，不依赖 IO。
//!
//! ## 检查项
//!
//! - Error：选项指向不存在的场景、选项指向线性场景、空选项列表、故事起点无效
//! - Warn：从任何故事起点都无法到达的场景
//! - Info：可到达的结局没有对应成就

use std::collections::{HashMap, HashSet, VecDeque};

use crate::scene::{Achievement, EndCode, SceneDefinition, SceneKind, Story, StoryCode};

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticLevel {
    /// 信息提示
    Info,
    /// 警告（建议修复）
    Warn,
    /// 错误（必须修复）
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 诊断条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// 出问题的场景 ID（故事级问题为故事代码）
    pub subject: String,
    pub message: String,
    /// 诊断详情（可选）
    pub detail: Option<String>,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            subject: subject.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, subject, message)
    }

    pub fn warn(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, subject, message)
    }

    pub fn info(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, subject, message)
    }

    /// 设置详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.subject, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n  | {}", detail)?;
        }
        Ok(())
    }
}

/// 诊断结果
#[derive(Debug, Clone, Default)]
pub struct DiagnosticResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(DiagnosticLevel::Error) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 按级别过滤
    pub fn filter_by_level(&self, min_level: DiagnosticLevel) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level >= min_level)
            .collect()
    }
}

/// 分析场景图
pub fn analyze_scenes(
    scenes: &[SceneDefinition],
    stories: &[Story],
    achievements: &[Achievement],
) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();
    let index: HashMap<&str, &SceneDefinition> =
        scenes.iter().map(|s| (s.id.as_str(), s)).collect();

    for scene in scenes {
        check_links(scene, &index, &mut result);
    }

    let rewarded: HashSet<(StoryCode, EndCode)> =
        achievements.iter().map(|a| (a.story, a.end)).collect();
    let mut reachable: HashSet<&str> = HashSet::new();

    for story in stories {
        match index.get(story.start.as_str()) {
            Some(start) if start.is_navigable() => {}
            Some(_) => {
                result.push(
                    Diagnostic::error(story.code.to_string(), "故事起点不是可导航的场景")
                        .with_detail(format!("start = '{}'", story.start)),
                );
                continue;
            }
            None => {
                result.push(
                    Diagnostic::error(story.code.to_string(), "故事起点不存在")
                        .with_detail(format!("start = '{}'", story.start)),
                );
                continue;
            }
        }

        for id in walk(&story.start, &index) {
            reachable.insert(id);
            if let Some(end) = index.get(id).and_then(|s| s.end_code())
                && !rewarded.contains(&(story.code, end))
            {
                result.push(Diagnostic::info(
                    id,
                    format!("故事 {} 的结局 {} 没有对应成就", story.code, end),
                ));
            }
        }
    }

    if !stories.is_empty() {
        for scene in scenes {
            if !reachable.contains(scene.id.as_str()) {
                result.push(Diagnostic::warn(&scene.id, "从任何故事起点都无法到达"));
            }
        }
    }

    result
}

fn check_links(
    scene: &SceneDefinition,
    index: &HashMap<&str, &SceneDefinition>,
    result: &mut DiagnosticResult,
) {
    let SceneKind::Choice { choices } = &scene.kind else {
        return;
    };
    if choices.is_empty() {
        result.push(Diagnostic::error(&scene.id, "分支场景没有选项"));
    }
    for (i, choice) in choices.iter().enumerate() {
        match index.get(choice.target.as_str()) {
            None => result.push(
                Diagnostic::error(&scene.id, format!("选项 {} 指向不存在的场景", i))
                    .with_detail(format!("'{}' -> '{}'", choice.text, choice.target)),
            ),
            Some(target) if !target.is_navigable() => result.push(
                Diagnostic::error(&scene.id, format!("选项 {} 指向线性场景", i))
                    .with_detail(format!("'{}' -> '{}'", choice.text, choice.target)),
            ),
            Some(_) => {}
        }
    }
}

/// 从起点广度优先遍历，返回可到达的场景 ID
fn walk<'a>(start: &'a str, index: &HashMap<&'a str, &'a SceneDefinition>) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
        let Some(scene) = index.get(id) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        for choice in scene.choices() {
            queue.push_back(choice.target.as_str());
        }
    }
    order
}
