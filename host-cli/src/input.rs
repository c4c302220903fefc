//! # Input 模块
//!
//! 标准输入一行对应一条指令：
//!
//! | 输入 | 指令 |
//! |------|------|
//! | 空行 | 显示中跳过，选择中确认 |
//! | `u` / `d` | 光标上移 / 下移 |
//! | `s` / `l` | 存档 / 读档 |
//! | `q` | 返回菜单 |

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use scene_runtime::{NavState, PlayerCommand};
use tracing::debug;

/// 把一行输入解析为指令
pub fn parse_command(line: &str, state: NavState) -> Option<PlayerCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" if state == NavState::Displaying => Some(PlayerCommand::Skip),
        "" => Some(PlayerCommand::Select),
        "u" | "k" => Some(PlayerCommand::MoveUp),
        "d" | "j" => Some(PlayerCommand::MoveDown),
        "s" => Some(PlayerCommand::Save),
        "l" => Some(PlayerCommand::Load),
        "q" => Some(PlayerCommand::Menu),
        _ => None,
    }
}

/// 启动标准输入读取线程
///
/// 标准输入关闭后 channel 断开。
pub fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
            debug!("标准输入已关闭");
        })?;
    Ok(receiver)
}
