//! # Navigation 模块
//!
//! 场景导航：状态机与回合控制器。

mod controller;
mod state;

pub use controller::{EngineContext, NavigationController, NavigatorConfig};
pub use state::{NavState, SelectOutcome, WorkerCounts};
