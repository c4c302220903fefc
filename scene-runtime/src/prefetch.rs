//! # Prefetch 模块
//!
//! 场景预加载器：在当前场景显示期间，并发加载所有选项指向的场景正文。
//!
//! ## 执行模型
//!
//! ```text
//! Prefetcher::spawn(choices)
//!   └─ scene-prefetch 线程（收集者）
//!        ├─ scene-load 0 ─┐
//!        ├─ scene-load 1 ─┼─ (下标, 结果) ─► 按下标收集 ─► LoadedBatch ─► channel
//!        └─ scene-load n ─┘
//! ```
//!
//! 结果按下标收集，与各个加载完成的先后无关；无法解析的目标在对应位置为 `None`。
//!
//! 收集者在等待期间检查取消信号，取消后立即退出；仍在阻塞读取的加载线程
//! 完成后把结果发往已关闭的 channel。

use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{NavigationError, ResourceError};
use crate::scene::{Choice, LoadedBatch, LoadedScene, SceneRef};
use crate::signal::{WorkerGauge, WorkerSignal};
use crate::store::ResourceStore;

/// 解析并加载单个场景
///
/// 场景不存在时返回错误；正文读取失败不视为错误，`text` 为 `None`。
pub fn load_scene(store: &dyn ResourceStore, id: &str) -> Result<LoadedScene, ResourceError> {
    let definition = store.resolve(id)?;
    let text = match read_body(store, id) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(scene = %id, error = %e, "场景正文读取失败");
            None
        }
    };
    Ok(LoadedScene::new(definition, text))
}

fn read_body(store: &dyn ResourceStore, id: &str) -> Result<String, ResourceError> {
    let mut reader = store.open_body(id)?;
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| ResourceError::ReadFailed {
            id: id.to_string(),
            message: e.to_string(),
        })?;
    Ok(text)
}

/// 收集者检查取消信号的间隔
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// 加载一个选项目标
///
/// 目标不存在、不可导航（线性场景）或定义无效时返回 `None`。
fn load_target(store: &dyn ResourceStore, signal: &WorkerSignal, target: &str) -> Option<LoadedScene> {
    if signal.is_cancelled() {
        return None;
    }
    match load_scene(store, target) {
        Ok(scene) if !scene.definition.is_navigable() => {
            warn!(scene = %target, "选项指向不可导航的场景");
            None
        }
        Ok(scene) => match scene.definition.validate() {
            Ok(()) => Some(scene),
            Err(e) => {
                warn!(scene = %target, error = %e, "选项目标定义无效");
                None
            }
        },
        Err(e) => {
            warn!(scene = %target, error = %e, "选项目标无法解析");
            None
        }
    }
}

/// 并发加载全部目标，结果与输入按下标对齐
pub fn load_batch(store: &dyn ResourceStore, signal: &WorkerSignal, targets: &[SceneRef]) -> LoadedBatch {
    thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| scope.spawn(move || load_target(store, signal, target)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(None))
            .collect()
    })
}

/// 为每个目标启动独立的加载线程，等待期间可被取消
///
/// 取消时返回 `None`，不等待仍在运行的加载线程。
fn collect_batch(
    store: &Arc<dyn ResourceStore>,
    signal: &WorkerSignal,
    targets: &[SceneRef],
) -> Option<LoadedBatch> {
    let (sender, receiver) = mpsc::channel();
    let mut batch: LoadedBatch = vec![None; targets.len()];
    let mut pending = 0usize;

    for (index, target) in targets.iter().enumerate() {
        let store = store.clone();
        let loader_signal = signal.clone();
        let owned = target.clone();
        let sender = sender.clone();
        let spawned = thread::Builder::new()
            .name("scene-load".to_string())
            .spawn(move || {
                let scene = load_target(store.as_ref(), &loader_signal, &owned);
                // 收集者已退出时结果被丢弃
                let _ = sender.send((index, scene));
            });
        match spawned {
            Ok(_) => pending += 1,
            Err(e) => warn!(scene = %target, error = %e, "无法启动加载线程"),
        }
    }
    drop(sender);

    while pending > 0 {
        if signal.is_cancelled() {
            return None;
        }
        match receiver.recv_timeout(CANCEL_CHECK_INTERVAL) {
            Ok((index, scene)) => {
                if let Some(slot) = batch.get_mut(index) {
                    *slot = scene;
                }
                pending -= 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            // 加载线程 panic 时对应位置保持 `None`
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Some(batch)
}

/// 预加载器
///
/// 属于唯一一个回合；回合被取代后结果不再被读取。
#[derive(Debug)]
pub struct Prefetcher {
    signal: WorkerSignal,
    receiver: Receiver<LoadedBatch>,
    handle: Option<JoinHandle<()>>,
    result: Option<LoadedBatch>,
    len: usize,
}

impl Prefetcher {
    /// 启动预加载线程
    pub fn spawn(
        choices: &[Choice],
        store: Arc<dyn ResourceStore>,
        gauge: &WorkerGauge,
    ) -> Result<Self, NavigationError> {
        let targets: Vec<SceneRef> = choices.iter().map(|c| c.target.clone()).collect();
        let len = targets.len();
        let signal = WorkerSignal::new();
        let (sender, receiver) = mpsc::sync_channel(1);

        let worker_signal = signal.clone();
        let guard = gauge.enter();
        let handle = thread::Builder::new()
            .name("scene-prefetch".to_string())
            .spawn(move || {
                let _guard = guard;
                let batch = match collect_batch(&store, &worker_signal, &targets) {
                    Some(batch) if !worker_signal.is_cancelled() => batch,
                    _ => {
                        debug!("预加载已取消，丢弃结果");
                        return;
                    }
                };
                // 接收端已被丢弃时结果无人读取
                let _ = sender.send(batch);
            })
            .map_err(|e| NavigationError::Spawn {
                worker: "scene-prefetch".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            signal,
            receiver,
            handle: Some(handle),
            result: None,
            len,
        })
    }

    /// 阻塞等待预加载结果
    ///
    /// 没有超时；工作线程异常退出时返回全部为 `None` 的结果。
    pub fn await_result(&mut self) -> &LoadedBatch {
        if self.result.is_none() {
            let batch = self.receiver.recv().unwrap_or_else(|_| {
                warn!("预加载线程未返回结果");
                vec![None; self.len]
            });
            self.result = Some(batch);
        }
        self.result.get_or_insert_with(Vec::new)
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some() || self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// 取消并等待线程退出
    pub fn shutdown(mut self) {
        self.signal.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
