//! # Navigation State 模块
//!
//! 导航控制器的状态机定义。
//!
//! ```text
//! Idle ──start──► Displaying ──显示完成──► AwaitingChoice ──select──► Displaying
//!                     │                          │
//!                     └──结局场景──► Ended ◄──menu──┘
//! ```

use crate::scene::SceneRef;

/// 导航状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// 尚未开始
    Idle,
    /// 正在逐字显示场景正文
    Displaying,
    /// 等待玩家选择
    AwaitingChoice,
    /// 本轮结束（到达结局或返回菜单），控制权交回菜单
    Ended,
}

impl NavState {
    /// 是否还有后续回合
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Displaying | Self::AwaitingChoice)
    }
}

impl Default for NavState {
    fn default() -> Self {
        Self::Idle
    }
}

/// 选择结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// 已进入目标场景
    Advanced { scene: SceneRef },
    /// 目标无法解析，状态保持不变
    BrokenLink { index: usize, target: SceneRef },
}

/// 存活工作线程数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerCounts {
    pub display: usize,
    pub prefetch: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_state_active() {
        assert!(!NavState::Idle.is_active());
        assert!(NavState::Displaying.is_active());
        assert!(NavState::AwaitingChoice.is_active());
        assert!(!NavState::Ended.is_active());
        assert_eq!(NavState::default(), NavState::Idle);
    }
}
