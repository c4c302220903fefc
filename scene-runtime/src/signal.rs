//! # Signal 模块
//!
//! 工作线程的协作式中断信号。
//!
//! 每个工作线程持有一个 [`WorkerSignal`]，在挂起点（字符间等待、阻塞读取前后）
//! 检查它。控制器只负责发信号，不强制终止线程。
//!
//! ```text
//! Running ──skip()──► Skipped
//!    │                   │
//!    └────cancel()───────┴──► Cancelled
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// 中断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// 跳过：立即完成当前工作
    Skip,
    /// 取消：回合已被取代，直接退出
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalState {
    Running,
    Skipped,
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SignalState>,
    changed: Condvar,
}

/// 工作线程信号
#[derive(Debug, Clone)]
pub struct WorkerSignal {
    shared: Arc<Shared>,
}

impl Default for WorkerSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SignalState::Running),
                changed: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 请求跳过（已取消时无效）
    pub fn skip(&self) {
        let mut state = self.lock();
        if *state == SignalState::Running {
            *state = SignalState::Skipped;
            self.shared.changed.notify_all();
        }
    }

    /// 请求取消
    pub fn cancel(&self) {
        let mut state = self.lock();
        *state = SignalState::Cancelled;
        self.shared.changed.notify_all();
    }

    /// 当前的中断请求
    pub fn interrupt(&self) -> Option<Interrupt> {
        match *self.lock() {
            SignalState::Running => None,
            SignalState::Skipped => Some(Interrupt::Skip),
            SignalState::Cancelled => Some(Interrupt::Cancel),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.interrupt() == Some(Interrupt::Cancel)
    }

    /// 等待指定时长，期间收到中断立即返回
    ///
    /// 正常超时返回 `None`。
    pub fn wait(&self, duration: Duration) -> Option<Interrupt> {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        loop {
            match *state {
                SignalState::Skipped => return Some(Interrupt::Skip),
                SignalState::Cancelled => return Some(Interrupt::Cancel),
                SignalState::Running => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .shared
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

/// 存活工作线程计数器
///
/// 线程启动时获取 [`WorkerGuard`]，线程退出时 guard 被 drop，计数减一。
#[derive(Debug, Clone, Default)]
pub struct WorkerGauge {
    live: Arc<AtomicUsize>,
}

impl WorkerGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> WorkerGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        WorkerGuard {
            live: self.live.clone(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// 存活计数 guard
#[derive(Debug)]
pub struct WorkerGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out() {
        let signal = WorkerSignal::new();
        let started = Instant::now();
        assert_eq!(signal.wait(Duration::from_millis(20)), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_skip_wakes_waiter() {
        let signal = WorkerSignal::new();
        let waiter = signal.clone();
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(10));
        signal.skip();
        assert_eq!(handle.join().unwrap(), Some(Interrupt::Skip));
    }

    #[test]
    fn test_cancel_overrides_skip() {
        let signal = WorkerSignal::new();
        signal.skip();
        signal.cancel();
        signal.skip();
        assert_eq!(signal.interrupt(), Some(Interrupt::Cancel));
        assert_eq!(signal.wait(Duration::from_secs(30)), Some(Interrupt::Cancel));
    }

    #[test]
    fn test_gauge_counts_guards() {
        let gauge = WorkerGauge::new();
        let a = gauge.enter();
        let b = gauge.enter();
        assert_eq!(gauge.live(), 2);
        drop(a);
        assert_eq!(gauge.live(), 1);
        drop(b);
        assert_eq!(gauge.live(), 0);
    }
}
