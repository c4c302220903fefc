//! # Host 层
//!
//! 场景播放器的宿主层实现：把 `scene-runtime` 的协作者接口接到文件系统上。
//!
//! ## 架构说明
//!
//! Host 层负责：
//! - 配置加载
//! - 资源记录扫描与正文读取
//! - 设置文件读写（文字速度、存档指针、结局进度）
//!
//! Host 层不包含导航逻辑，界面由上层（如 `host-cli`）提供。

pub mod config;
pub mod resources;
pub mod settings;

pub use config::{AppConfig, ConfigError};
pub use resources::FsSceneStore;
pub use settings::SettingsFile;
