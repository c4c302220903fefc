//! # Navigation Controller 模块
//!
//! 导航控制器：驱动“显示场景 → 等待选择 → 进入下一场景”的回合循环。
//!
//! ## 回合模型
//!
//! 每个回合启动两个工作线程：
//!
//! - 显示线程：逐字显示当前场景正文
//! - 预加载线程：并发加载当前场景所有选项的目标（仅分支场景）
//!
//! 进入新回合前，上一回合的两个线程先被取消并 join，
//! 因此任何时刻每类工作线程最多只有一个存活。
//!
//! 控制器是回合状态（当前场景、光标、预加载结果）的唯一修改者；
//! 工作线程的结果只通过 `join` / channel 交接。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::completion::CompletionTracker;
use crate::error::{NavResult, NavigationError};
use crate::input::PlayerCommand;
use crate::navigation::state::{NavState, SelectOutcome, WorkerCounts};
use crate::persistence::Persistence;
use crate::prefetch::{Prefetcher, load_scene};
use crate::presenter::{Notice, Presenter};
use crate::scene::{Choice, EndCode, LoadedScene, SceneKind, StoryCode};
use crate::signal::{WorkerGauge, WorkerSignal};
use crate::store::ResourceStore;
use crate::typewriter::{DEFAULT_BASE_DELAY, DisplayOutcome, DisplayWorker, TextPacing, Typewriter};

/// 控制器依赖的外部协作者
///
/// 由调用方注入，控制器不持有任何全局单例。
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn ResourceStore>,
    pub persistence: Arc<dyn Persistence>,
    pub completion: Arc<CompletionTracker>,
    pub presenter: Arc<dyn Presenter>,
}

/// 控制器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorConfig {
    /// 逐字显示的基础延迟
    pub base_delay: Duration,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

/// 一个回合的临时状态
struct Turn {
    scene: LoadedScene,
    display: Option<DisplayWorker>,
    prefetch: Option<Prefetcher>,
    cursor: usize,
}

impl Turn {
    /// 取消并等待本回合的工作线程
    fn retire(self) {
        if let Some(display) = &self.display {
            display.cancel();
        }
        if let Some(prefetch) = &self.prefetch {
            prefetch.cancel();
        }
        if let Some(display) = self.display {
            display.join();
        }
        if let Some(prefetch) = self.prefetch {
            prefetch.shutdown();
        }
    }
}

/// 导航控制器
pub struct NavigationController {
    context: EngineContext,
    config: NavigatorConfig,
    state: NavState,
    story: Option<StoryCode>,
    turn: Option<Turn>,
    end_code: Option<EndCode>,
    display_gauge: WorkerGauge,
    prefetch_gauge: WorkerGauge,
}

impl NavigationController {
    pub fn new(context: EngineContext, config: NavigatorConfig) -> Self {
        Self {
            context,
            config,
            state: NavState::Idle,
            story: None,
            turn: None,
            end_code: None,
            display_gauge: WorkerGauge::new(),
            prefetch_gauge: WorkerGauge::new(),
        }
    }

    /// 从指定场景开始一个故事
    ///
    /// 场景不存在或不可导航时返回 `InvalidStart`，当前回合保持不变。
    pub fn start(&mut self, start_id: &str, story: char) -> NavResult<()> {
        let story = StoryCode::new(story)?;

        let scene = match load_scene(self.context.store.as_ref(), start_id) {
            Ok(scene) if !scene.definition.is_navigable() => {
                return Err(self.invalid_start(start_id, "不是可导航的场景"));
            }
            Ok(scene) => match scene.definition.validate() {
                Ok(()) => scene,
                Err(e) => return Err(self.invalid_start(start_id, &e.to_string())),
            },
            Err(e) => return Err(self.invalid_start(start_id, &e.to_string())),
        };

        info!(scene = %start_id, story = %story, "开始故事");
        self.story = Some(story);
        self.end_code = None;
        self.advance_to(scene)
    }

    fn invalid_start(&self, id: &str, reason: &str) -> NavigationError {
        warn!(scene = %id, reason = %reason, "无效的起始场景");
        self.context.presenter.show_error(&Notice::InvalidStart {
            id: id.to_string(),
        });
        NavigationError::InvalidStart {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// 进入新场景，取代当前回合
    fn advance_to(&mut self, scene: LoadedScene) -> NavResult<()> {
        self.retire_turn();
        self.context.presenter.clear();

        let pacing = TextPacing::new(self.config.base_delay, self.context.persistence.text_speed());
        let typewriter = Typewriter::new(
            scene.text.clone(),
            pacing,
            self.context.presenter.clone(),
            WorkerSignal::new(),
        );
        let display = match DisplayWorker::spawn(typewriter, &self.display_gauge) {
            Ok(display) => display,
            Err(e) => return Err(self.abandon_turn(e)),
        };

        let prefetch = match &scene.definition.kind {
            SceneKind::Choice { choices } => {
                match Prefetcher::spawn(choices, self.context.store.clone(), &self.prefetch_gauge) {
                    Ok(prefetch) => Some(prefetch),
                    Err(e) => {
                        display.cancel();
                        display.join();
                        return Err(self.abandon_turn(e));
                    }
                }
            }
            _ => None,
        };

        debug!(scene = %scene.id(), "进入场景");
        self.turn = Some(Turn {
            scene,
            display: Some(display),
            prefetch,
            cursor: 0,
        });
        self.state = NavState::Displaying;
        Ok(())
    }

    /// 工作线程无法启动：旧回合已退役，会话结束
    fn abandon_turn(&mut self, e: NavigationError) -> NavigationError {
        error!(error = %e, "无法启动回合");
        self.end_code = None;
        self.state = NavState::Ended;
        e
    }

    fn retire_turn(&mut self) {
        if let Some(turn) = self.turn.take() {
            turn.retire();
        }
    }

    /// 非阻塞地检查显示是否完成，完成则推进状态
    pub fn poll(&mut self) -> NavState {
        let finished = self
            .turn
            .as_ref()
            .and_then(|t| t.display.as_ref())
            .is_some_and(DisplayWorker::is_finished);
        if self.state == NavState::Displaying && finished {
            self.finish_display();
        }
        self.state
    }

    /// 阻塞等待显示完成
    pub fn wait_display(&mut self) -> NavState {
        if self.state == NavState::Displaying {
            self.finish_display();
        }
        self.state
    }

    fn finish_display(&mut self) {
        let Some(turn) = self.turn.as_mut() else {
            return;
        };
        if let Some(display) = turn.display.take() {
            let outcome = display.join();
            if outcome == DisplayOutcome::Cancelled {
                warn!(scene = %turn.scene.id(), "显示线程异常结束");
            }
        }

        match &turn.scene.definition.kind {
            SceneKind::Choice { choices } => {
                turn.cursor = 0;
                self.context.presenter.show_choices(choices, 0);
                self.state = NavState::AwaitingChoice;
            }
            SceneKind::End { code } => {
                let code = *code;
                self.end_code = Some(code);
                self.state = NavState::Ended;
                self.record_ending(code);
            }
            SceneKind::Linear => {
                error!(scene = %turn.scene.id(), "线性场景不能作为导航终点");
                self.state = NavState::Ended;
            }
        }
    }

    fn record_ending(&self, end: EndCode) {
        let Some(story) = self.story else {
            return;
        };
        if let Err(e) = self.context.completion.mark(story, end) {
            error!(story = %story, end = %end, error = %e, "保存结局失败");
        }
        let achievement = self.context.store.achievement(story, end);
        self.context
            .presenter
            .show_ending(story, end, achievement.as_ref());
    }

    /// 跳过逐字显示
    ///
    /// 只影响显示线程，不影响预加载。
    pub fn on_skip(&mut self) -> bool {
        match self.turn.as_ref().and_then(|t| t.display.as_ref()) {
            Some(display) if self.state == NavState::Displaying => {
                display.skip();
                true
            }
            _ => false,
        }
    }

    /// 移动选项光标，结果限制在 `[0, n-1]`
    pub fn on_move_cursor(&mut self, delta: isize) -> NavResult<usize> {
        self.expect_state(NavState::AwaitingChoice)?;
        let Some(turn) = self.turn.as_mut() else {
            return Err(self.mismatch(NavState::AwaitingChoice));
        };

        let choices = turn.scene.definition.choices();
        let last = choices.len().saturating_sub(1) as isize;
        let cursor = (turn.cursor as isize).saturating_add(delta).clamp(0, last) as usize;
        if cursor != turn.cursor {
            turn.cursor = cursor;
            self.context.presenter.show_choices(choices, cursor);
        }
        Ok(cursor)
    }

    /// 确认当前选项
    ///
    /// 阻塞等待本回合的预加载完成。目标无法解析时报告断链，状态保持不变。
    pub fn on_select(&mut self) -> NavResult<SelectOutcome> {
        self.expect_state(NavState::AwaitingChoice)?;
        let Some(turn) = self.turn.as_mut() else {
            return Err(self.mismatch(NavState::AwaitingChoice));
        };

        let cursor = turn.cursor;
        let target = turn
            .scene
            .definition
            .choices()
            .get(cursor)
            .map(|c| c.target.clone())
            .unwrap_or_default();
        let loaded = turn
            .prefetch
            .as_mut()
            .and_then(|p| p.await_result().get(cursor).cloned().flatten());

        match loaded {
            Some(scene) => {
                let id = scene.id().to_string();
                self.advance_to(scene)?;
                Ok(SelectOutcome::Advanced { scene: id })
            }
            None => {
                warn!(index = cursor, target = %target, "选项链接已断开");
                self.context.presenter.show_error(&Notice::BrokenLink {
                    target: target.clone(),
                });
                Ok(SelectOutcome::BrokenLink {
                    index: cursor,
                    target,
                })
            }
        }
    }

    /// 把当前场景写为存档指针
    pub fn on_save(&mut self) -> NavResult<()> {
        let Some(id) = self.turn.as_ref().map(|t| t.scene.id().to_string()) else {
            return Err(self.mismatch(NavState::Displaying));
        };
        if let Err(e) = self.context.persistence.set_save_pointer(Some(&id)) {
            self.context.presenter.show_error(&Notice::SaveFailed {
                message: e.to_string(),
            });
            return Err(e.into());
        }
        info!(scene = %id, "已存档");
        Ok(())
    }

    /// 从存档指针重新开始
    pub fn on_load(&mut self, story: char) -> NavResult<()> {
        let Some(pointer) = self.context.persistence.save_pointer() else {
            self.context.presenter.show_error(&Notice::NoSave);
            return Err(NavigationError::NoSave);
        };
        self.start(&pointer, story)
    }

    /// 返回菜单：取消全部工作线程，非结局退出
    pub fn on_menu(&mut self) {
        self.retire_turn();
        self.context.presenter.clear();
        self.end_code = None;
        self.state = NavState::Ended;
        debug!("返回菜单");
    }

    /// 分发表现层指令
    ///
    /// 与当前状态不匹配的指令被忽略。
    pub fn handle(&mut self, command: PlayerCommand) -> NavResult<()> {
        let result = match command {
            PlayerCommand::Skip => {
                self.on_skip();
                Ok(())
            }
            PlayerCommand::MoveUp | PlayerCommand::MoveDown => {
                let delta = command.cursor_delta().unwrap_or(0);
                self.on_move_cursor(delta).map(|_| ())
            }
            PlayerCommand::Select => self.on_select().map(|_| ()),
            PlayerCommand::Save => self.on_save(),
            PlayerCommand::Load => match self.story {
                Some(story) => self.on_load(story.as_char()),
                None => Err(self.mismatch(NavState::Displaying)),
            },
            PlayerCommand::Menu => {
                self.on_menu();
                Ok(())
            }
        };

        match result {
            Err(NavigationError::StateMismatch { expected, actual }) => {
                debug!(command = ?command, expected = %expected, actual = %actual, "忽略指令");
                Ok(())
            }
            Err(NavigationError::NoSave) => Ok(()),
            other => other,
        }
    }

    /// 会话结束：停止工作线程并写回通关进度
    pub fn shutdown(&mut self) {
        self.retire_turn();
        if let Err(e) = self.context.completion.flush() {
            error!(error = %e, "写回通关进度失败");
        }
    }

    fn expect_state(&self, expected: NavState) -> NavResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.mismatch(expected))
        }
    }

    fn mismatch(&self, expected: NavState) -> NavigationError {
        NavigationError::StateMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", self.state),
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn story(&self) -> Option<StoryCode> {
        self.story
    }

    pub fn current_scene(&self) -> Option<&LoadedScene> {
        self.turn.as_ref().map(|t| &t.scene)
    }

    /// 当前场景的选项
    pub fn choices(&self) -> &[Choice] {
        self.turn
            .as_ref()
            .map(|t| t.scene.definition.choices())
            .unwrap_or(&[])
    }

    /// 光标位置（仅在等待选择时有效）
    pub fn cursor(&self) -> Option<usize> {
        match (&self.turn, self.state) {
            (Some(turn), NavState::AwaitingChoice) => Some(turn.cursor),
            _ => None,
        }
    }

    /// 本回合到达的结局
    pub fn end_code(&self) -> Option<EndCode> {
        self.end_code
    }

    /// 预加载是否已完成（没有预加载时为 `true`）
    pub fn is_prefetch_ready(&self) -> bool {
        self.turn
            .as_ref()
            .and_then(|t| t.prefetch.as_ref())
            .is_none_or(Prefetcher::is_finished)
    }

    pub fn live_workers(&self) -> WorkerCounts {
        WorkerCounts {
            display: self.display_gauge.live(),
            prefetch: self.prefetch_gauge.live(),
        }
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        self.retire_turn();
    }
}
