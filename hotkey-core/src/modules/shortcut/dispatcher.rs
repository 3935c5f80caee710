//! 事件分发器
//!
//! 系统回调线程只负责把令牌放进 [`NotificationSink`]，
//! 查表和调用应用回调由分发器完成，回调执行期间不持有注册表的锁

use super::backend::BackendToken;
use super::registry::HotkeyRegistry;
use crate::error::HotkeyError;
use crate::events::HotkeyEvent;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// 分发模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// 独立工作线程按到达顺序逐个处理
    #[default]
    Threaded,
    /// 在发出通知的线程上直接处理
    Inline,
}

/// 分发器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// 队列容量，None 表示不限
    pub queue_capacity: Option<usize>,
    /// 工作线程名称
    pub thread_name: String,
    /// 是否记录被丢弃的通知
    pub log_dropped: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Threaded,
            queue_capacity: None,
            thread_name: "hotkey-dispatch".to_string(),
            log_dropped: true,
        }
    }
}

/// 分发统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// 收到的系统通知
    pub received: u64,
    /// 成功调用回调的次数
    pub delivered: u64,
    /// 找不到注册项、队列已满或分发器已停止而丢弃的通知
    pub dropped: u64,
    /// 回调 panic 次数
    pub handler_panics: u64,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    received: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    handler_panics: AtomicU64,
}

enum DispatchMessage {
    Pressed {
        token: BackendToken,
        sequence: u64,
        pressed_at: DateTime<Utc>,
    },
    Shutdown,
}

struct DispatchCore {
    registry: Arc<HotkeyRegistry>,
    counters: DispatchCounters,
    active: AtomicBool,
    log_dropped: bool,
}

impl DispatchCore {
    fn new(registry: Arc<HotkeyRegistry>, log_dropped: bool) -> Self {
        Self {
            registry,
            counters: DispatchCounters::default(),
            active: AtomicBool::new(true),
            log_dropped,
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn dispatch(&self, token: BackendToken, sequence: u64, pressed_at: DateTime<Utc>) {
        if !self.is_active() {
            self.drop_notification(token, "dispatcher stopped");
            return;
        }

        // 注销与在途通知竞争时查不到注册项，属于正常情况
        let Some(registration) = self.registry.lookup_by_token(token) else {
            self.drop_notification(token, "no matching registration");
            return;
        };

        let event = HotkeyEvent {
            id: registration.id,
            combination: registration.combination,
            sequence,
            pressed_at,
        };
        let handler = registration.handler;

        match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => {
                self.counters.handler_panics.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    "Hotkey handler for {} (#{}) panicked",
                    registration.combination,
                    registration.id
                );
            }
        }
    }

    fn drop_notification(&self, token: BackendToken, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        if self.log_dropped {
            tracing::debug!("Dropped hotkey notification {}: {}", token, reason);
        }
    }

    fn stats(&self) -> DispatchStats {
        DispatchStats {
            received: self.counters.received.load(Ordering::SeqCst),
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
            handler_panics: self.counters.handler_panics.load(Ordering::SeqCst),
        }
    }
}

#[derive(Clone)]
enum SinkRoute {
    Queue(Sender<DispatchMessage>),
    Inline,
}

/// 系统回调使用的通知入口
///
/// 可在任意线程调用，永不阻塞
#[derive(Clone)]
pub struct NotificationSink {
    core: Arc<DispatchCore>,
    route: SinkRoute,
}

impl fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let route = match self.route {
            SinkRoute::Queue(_) => "queue",
            SinkRoute::Inline => "inline",
        };
        f.debug_struct("NotificationSink")
            .field("route", &route)
            .field("active", &self.core.is_active())
            .finish()
    }
}

impl NotificationSink {
    /// 上报一次按键通知
    pub fn notify(&self, token: BackendToken) {
        let sequence = self.core.counters.received.fetch_add(1, Ordering::SeqCst) + 1;
        let pressed_at = Utc::now();

        match &self.route {
            SinkRoute::Inline => self.core.dispatch(token, sequence, pressed_at),
            SinkRoute::Queue(tx) => {
                let message = DispatchMessage::Pressed {
                    token,
                    sequence,
                    pressed_at,
                };
                match tx.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.core.drop_notification(token, "dispatch queue full")
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        self.core.drop_notification(token, "dispatcher stopped")
                    }
                }
            }
        }
    }
}

struct Worker {
    tx: Sender<DispatchMessage>,
    handle: JoinHandle<()>,
}

/// 事件分发器
///
/// 生命周期由 HotkeyManager 管理：首次注册时创建，关闭时停止
pub struct EventDispatcher {
    core: Arc<DispatchCore>,
    sink: NotificationSink,
    mode: DispatchMode,
    worker: Option<Worker>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("mode", &self.mode)
            .field("active", &self.core.is_active())
            .field("stats", &self.core.stats())
            .finish()
    }
}

impl EventDispatcher {
    /// 创建并启动分发器
    ///
    /// 队列容量为 0 时返回错误：零容量通道只能在工作线程等待时交接，通知会被全部丢弃
    pub fn start(
        registry: Arc<HotkeyRegistry>,
        config: &DispatchConfig,
    ) -> Result<Self, HotkeyError> {
        if config.mode == DispatchMode::Threaded && config.queue_capacity == Some(0) {
            return Err(HotkeyError::Internal(
                "Dispatch queue capacity must be at least 1".to_string(),
            ));
        }
        let core = Arc::new(DispatchCore::new(registry, config.log_dropped));

        let (route, worker) = match config.mode {
            DispatchMode::Inline => (SinkRoute::Inline, None),
            DispatchMode::Threaded => {
                let (tx, rx) = match config.queue_capacity {
                    Some(capacity) => channel::bounded(capacity),
                    None => channel::unbounded(),
                };
                let worker_core = core.clone();
                let handle = thread::Builder::new()
                    .name(config.thread_name.clone())
                    .spawn(move || run_worker(worker_core, rx))
                    .map_err(|e| {
                        HotkeyError::Internal(format!("Failed to spawn dispatcher thread: {}", e))
                    })?;
                (SinkRoute::Queue(tx.clone()), Some(Worker { tx, handle }))
            }
        };

        tracing::info!("Event dispatcher started in {:?} mode", config.mode);
        Ok(Self {
            sink: NotificationSink {
                core: core.clone(),
                route,
            },
            core,
            mode: config.mode,
            worker,
        })
    }

    /// 获取通知入口，交给系统接口安装
    pub fn sink(&self) -> NotificationSink {
        self.sink.clone()
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.core.is_active()
    }

    pub fn stats(&self) -> DispatchStats {
        self.core.stats()
    }

    /// 停止分发，之后到达的通知全部丢弃
    ///
    /// 在回调内部调用时不会等待工作线程自身退出
    pub fn stop(&mut self) {
        let was_active = self.core.active.swap(false, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            if thread::current().id() == worker.handle.thread().id() {
                tracing::debug!("Dispatcher stopped from its own worker thread, detaching");
            } else {
                let _ = worker.tx.send(DispatchMessage::Shutdown);
                if worker.handle.join().is_err() {
                    tracing::error!("Dispatcher worker thread panicked");
                }
            }
        }

        if was_active {
            let stats = self.core.stats();
            tracing::info!(
                "Event dispatcher stopped ({} received, {} delivered, {} dropped)",
                stats.received,
                stats.delivered,
                stats.dropped
            );
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(core: Arc<DispatchCore>, rx: Receiver<DispatchMessage>) {
    tracing::debug!("Dispatcher worker started");
    for message in rx.iter() {
        match message {
            DispatchMessage::Pressed {
                token,
                sequence,
                pressed_at,
            } => core.dispatch(token, sequence, pressed_at),
            DispatchMessage::Shutdown => break,
        }
        if !core.is_active() {
            break;
        }
    }
    tracing::debug!("Dispatcher worker exited");
}
