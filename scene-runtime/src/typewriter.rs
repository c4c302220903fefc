//! # Typewriter 模块
//!
//! 文字逐字显示引擎。
//!
//! ## 节奏
//!
//! ```text
//! delay(c) = base / speed * factor(c)
//!
//! factor('.' '!' '?' ':') = 10
//! factor('\n')            = 20
//! factor(其他)            = 1
//! ```
//!
//! 显示第一个字符前先等待一次 `base / speed`，之后每显示一个字符，
//! 按该字符的类别等待。每个场景使用一个新的实例，不复用。

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::trace;

use crate::error::NavigationError;
use crate::persistence::TextSpeed;
use crate::presenter::Presenter;
use crate::scene::BODY_LOAD_ERROR;
use crate::signal::{Interrupt, WorkerGauge, WorkerSignal};

/// 默认基础延迟
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);
/// 句末标点的延迟倍数
pub const SENTENCE_DELAY_FACTOR: u32 = 10;
/// 换行的延迟倍数
pub const LINE_BREAK_DELAY_FACTOR: u32 = 20;

/// 字符对应的延迟倍数
pub fn class_factor(c: char) -> u32 {
    match c {
        '.' | '!' | '?' | ':' => SENTENCE_DELAY_FACTOR,
        '\n' => LINE_BREAK_DELAY_FACTOR,
        _ => 1,
    }
}

/// 一次显示过程的节奏参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPacing {
    unit: Duration,
}

impl TextPacing {
    pub fn new(base: Duration, speed: TextSpeed) -> Self {
        Self {
            unit: base / speed.get(),
        }
    }

    /// 单位延迟（`base / speed`）
    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn delay(&self, c: char) -> Duration {
        self.unit * class_factor(c)
    }
}

/// 显示结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// 逐字显示完毕（包括正文读取失败直接显示错误文本）
    Completed,
    /// 被跳过，已一次性显示全文
    Skipped,
    /// 回合被取代，未显示完
    Cancelled,
}

/// 打字机
pub struct Typewriter {
    text: Option<Arc<str>>,
    pacing: TextPacing,
    presenter: Arc<dyn Presenter>,
    signal: WorkerSignal,
}

impl Typewriter {
    pub fn new(
        text: Option<Arc<str>>,
        pacing: TextPacing,
        presenter: Arc<dyn Presenter>,
        signal: WorkerSignal,
    ) -> Self {
        Self {
            text,
            pacing,
            presenter,
            signal,
        }
    }

    /// 在当前线程执行显示
    pub fn run(self) -> DisplayOutcome {
        let Some(text) = self.text.as_deref() else {
            self.presenter.show_text(BODY_LOAD_ERROR);
            return DisplayOutcome::Completed;
        };

        if let Some(interrupt) = self.signal.wait(self.pacing.unit()) {
            return self.interrupted(interrupt, text);
        }

        let mut buf = [0u8; 4];
        for c in text.chars() {
            if self.signal.is_cancelled() {
                return DisplayOutcome::Cancelled;
            }
            self.presenter.append_text(c.encode_utf8(&mut buf));
            if let Some(interrupt) = self.signal.wait(self.pacing.delay(c)) {
                return self.interrupted(interrupt, text);
            }
        }
        DisplayOutcome::Completed
    }

    fn interrupted(&self, interrupt: Interrupt, text: &str) -> DisplayOutcome {
        match interrupt {
            Interrupt::Skip => {
                trace!("跳过逐字显示");
                self.presenter.show_text(text);
                DisplayOutcome::Skipped
            }
            Interrupt::Cancel => DisplayOutcome::Cancelled,
        }
    }
}

/// 后台显示线程句柄
#[derive(Debug)]
pub struct DisplayWorker {
    signal: WorkerSignal,
    handle: JoinHandle<DisplayOutcome>,
}

impl DisplayWorker {
    /// 在新线程中运行打字机
    pub fn spawn(typewriter: Typewriter, gauge: &WorkerGauge) -> Result<Self, NavigationError> {
        let signal = typewriter.signal.clone();
        let guard = gauge.enter();
        let handle = thread::Builder::new()
            .name("scene-text".to_string())
            .spawn(move || {
                let _guard = guard;
                typewriter.run()
            })
            .map_err(|e| NavigationError::Spawn {
                worker: "scene-text".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { signal, handle })
    }

    pub fn skip(&self) {
        self.signal.skip();
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待线程结束
    ///
    /// 线程 panic 时按已取消处理。
    pub fn join(self) -> DisplayOutcome {
        self.handle.join().unwrap_or(DisplayOutcome::Cancelled)
    }
}
