//! # Input 模块
//!
//! 定义表现层向导航控制器传递的玩家指令。
//!
//! ## 设计说明
//!
//! - `PlayerCommand` 是 Host 采集用户操作后的语义化输入
//! - 控制器不直接处理键盘/鼠标事件
//! - 与当前状态不匹配的指令会被忽略

use serde::{Deserialize, Serialize};

/// 玩家指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerCommand {
    /// 跳过逐字显示
    Skip,
    /// 光标上移
    MoveUp,
    /// 光标下移
    MoveDown,
    /// 确认当前选项
    Select,
    /// 保存当前场景
    Save,
    /// 读取存档
    Load,
    /// 返回菜单
    Menu,
}

impl PlayerCommand {
    /// 光标移动量（非移动指令为 `None`）
    pub fn cursor_delta(self) -> Option<isize> {
        match self {
            Self::MoveUp => Some(-1),
            Self::MoveDown => Some(1),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_delta() {
        assert_eq!(PlayerCommand::MoveUp.cursor_delta(), Some(-1));
        assert_eq!(PlayerCommand::MoveDown.cursor_delta(), Some(1));
        assert_eq!(PlayerCommand::Select.cursor_delta(), None);
    }

    #[test]
    fn test_command_serialization() {
        let json = serde_json::to_string(&PlayerCommand::MoveDown).unwrap();
        assert_eq!(json, "\"move_down\"");
        let back: PlayerCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlayerCommand::MoveDown);
    }
}
