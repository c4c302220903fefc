//! # Scene Runtime
//!
//! 分支式视觉小说播放器的场景导航与预加载引擎。
//!
//! ## 架构概述
//!
//! `scene-runtime` 不依赖任何具体的文件系统或界面。
//! 它通过三个 trait 与宿主层（Host）协作：
//!
//! ```text
//! Host                                  Runtime
//!   │                                      │
//!   │──── PlayerCommand ─────────────────►│ NavigationController
//!   │                                      │   ├─ scene-text 线程（逐字显示）
//!   │◄─── Presenter 回调 ─────────────────│   └─ scene-prefetch 线程（并发加载选项目标）
//!   │                                      │
//!   │     ResourceStore / Persistence     │
//! ```
//!
//! ## 核心类型
//!
//! - [`NavigationController`]：回合循环与状态机
//! - [`CompletionTracker`]：每个故事的结局达成位图
//! - [`Typewriter`]：可跳过、可取消的逐字显示
//! - [`Prefetcher`]：按下标对齐的选项目标预加载
//!
//! ## 使用示例
//!
//! ```ignore
//! let context = EngineContext { store, persistence, completion, presenter };
//! let mut nav = NavigationController::new(context, NavigatorConfig::default());
//! nav.start("a.start", 'A')?;
//!
//! while nav.state().is_active() {
//!     nav.poll();
//!     if let Some(command) = next_command() {
//!         nav.handle(command)?;
//!     }
//! }
//! nav.shutdown();
//! ```
//!
//! ## 模块结构
//!
//! - [`scene`]：场景、故事、成就等数据模型
//! - [`store`] / [`persistence`] / [`presenter`]：外部协作者接口
//! - [`completion`]：通关进度
//! - [`typewriter`] / [`prefetch`] / [`signal`]：工作线程
//! - [`navigation`]：导航控制器
//! - [`diagnostic`]：场景图静态检查

pub mod completion;
pub mod diagnostic;
pub mod error;
pub mod input;
pub mod navigation;
pub mod persistence;
pub mod prefetch;
pub mod presenter;
pub mod scene;
pub mod signal;
pub mod store;
pub mod typewriter;

// 重导出核心类型
pub use completion::CompletionTracker;
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_scenes};
pub use error::{NavResult, NavigationError, ProgressError, RangeError, ResourceError, StorageError};
pub use input::PlayerCommand;
pub use navigation::{
    EngineContext, NavState, NavigationController, NavigatorConfig, SelectOutcome, WorkerCounts,
};
pub use persistence::{MemoryPersistence, Persistence, TextSpeed};
pub use prefetch::{Prefetcher, load_batch, load_scene};
pub use presenter::{Notice, Presenter, PresenterEvent, RecordingPresenter};
pub use scene::{
    Achievement, BODY_LOAD_ERROR, Choice, EndCode, LoadedBatch, LoadedScene, SceneDefinition,
    SceneKind, SceneRef, Story, StoryCode,
};
pub use signal::{Interrupt, WorkerGauge, WorkerGuard, WorkerSignal};
pub use store::{MemoryStore, ResourceStore};
pub use typewriter::{DEFAULT_BASE_DELAY, DisplayOutcome, DisplayWorker, TextPacing, Typewriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _scene = SceneDefinition::linear("a.intro", "intro.txt");
        let _command = PlayerCommand::Skip;
        let _state = NavState::default();
        let _speed = TextSpeed::default();
        assert_eq!(BODY_LOAD_ERROR, "Could not load Scene text");
    }
}
