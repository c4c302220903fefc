//! # Error 模块
//!
//! 定义 scene-runtime 中使用的错误类型。
//!
//! ## 传播约定
//!
//! - 正文读取失败、选项链接断开：在原地吸收，交给 Presenter 显示
//! - `InvalidStart` 与 `RangeError`：作为失败返回给调用方

use thiserror::Error;

use crate::scene::SceneRef;

/// 取值越界错误
///
/// 故事代码、结局代码、文字速度都有固定的合法区间，越界时直接拒绝，不做截断。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// 故事代码不在 'A'..='Z'
    #[error("故事代码 '{0}' 超出范围 'A'..='Z'")]
    StoryCode(char),

    /// 结局代码不在 1..=64
    #[error("结局代码 {0} 超出范围 1..=64")]
    EndCode(u32),

    /// 文字速度不在 1..=16
    #[error("文字速度 {0} 超出范围 1..=16")]
    TextSpeed(u32),
}

/// 资源读取错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// 资源未找到
    #[error("资源未找到: {id}")]
    NotFound { id: SceneRef },

    /// 资源读取失败
    #[error("读取资源 {id} 失败: {message}")]
    ReadFailed { id: SceneRef, message: String },

    /// 资源格式无效
    #[error("资源格式无效: {id} - {message}")]
    InvalidFormat { id: SceneRef, message: String },
}

/// 持久化存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 读写文件失败
    #[error("存储读写失败: {0}")]
    Io(String),

    /// 序列化失败
    #[error("存储序列化失败: {0}")]
    Serialize(String),
}

/// 通关进度错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("保存通关进度失败: {0}")]
    Storage(#[from] StorageError),
}

/// 导航错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// 起始场景不存在或不可导航
    #[error("无效的起始场景 '{id}': {reason}")]
    InvalidStart { id: SceneRef, reason: String },

    /// 没有存档指针
    #[error("没有可读取的存档")]
    NoSave,

    /// 参数越界
    #[error(transparent)]
    Range(#[from] RangeError),

    /// 状态不匹配
    #[error("当前状态不允许此操作：期望 {expected}，实际 {actual}")]
    StateMismatch { expected: String, actual: String },

    /// 无法启动后台线程
    #[error("无法启动工作线程 {worker}: {message}")]
    Spawn { worker: String, message: String },

    /// 存档读写失败
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result 类型别名
pub type NavResult<T> = Result<T, NavigationError>;
