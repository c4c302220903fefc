//! # Config 模块
//!
//! 播放器配置，集中管理所有配置项。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scene_runtime::TextSpeed;
use thiserror::Error;
use tracing::info;

/// 应用配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 资源根目录（包含 `resource.json` 记录的目录树）
    #[serde(default = "default_resources_root")]
    pub resources_root: PathBuf,

    /// 设置文件路径（文字速度、存档指针、结局进度）
    #[serde(default = "default_save_file")]
    pub save_file: PathBuf,

    /// 逐字显示的基础延迟（毫秒）
    #[serde(default = "default_base_text_delay_ms")]
    pub base_text_delay_ms: u64,

    /// 日志级别（trace/debug/info/warn/error）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 设置文件中没有记录时使用的文字速度
    #[serde(default = "default_text_speed")]
    pub default_text_speed: u32,
}

// 默认值函数
fn default_resources_root() -> PathBuf {
    PathBuf::from("resources")
}

fn default_save_file() -> PathBuf {
    PathBuf::from("save.json")
}

fn default_base_text_delay_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_text_speed() -> u32 {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            resources_root: default_resources_root(),
            save_file: default_save_file(),
            base_text_delay_ms: default_base_text_delay_ms(),
            log_level: default_log_level(),
            default_text_speed: default_text_speed(),
        }
    }
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 文件不存在时返回默认配置；文件存在但无法解析时返回错误。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;
        info!(path = %path.display(), "配置文件加载成功");
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;

        fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_text_delay_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "base_text_delay_ms 必须大于 0".to_string(),
            ));
        }

        self.text_speed()?;

        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_text_delay_ms)
    }

    /// 默认文字速度
    pub fn text_speed(&self) -> Result<TextSpeed, ConfigError> {
        TextSpeed::new(self.default_text_speed)
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))
    }
}

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 序列化失败
    #[error("配置序列化失败: {0}")]
    SerializationFailed(String),
    /// IO 错误
    #[error("配置 IO 错误: {0}")]
    IoError(String),
    /// 验证失败
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}
