//! 全局快捷键管理器
//!
//! 应用唯一需要接触的入口：组合注册表、分发器和平台接口
//!
//! 系统事件处理器在首次注册时才安装，关闭后管理器不可再用

use super::backend::BackendAdapter;
use super::combination::HotkeyCombination;
use super::dispatcher::{DispatchConfig, DispatchStats, EventDispatcher};
use super::registry::{HotkeyRegistry, RegistrationId, RegistrationInfo, TeardownReport};
use crate::error::HotkeyError;
use crate::events::HotkeyEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// 管理器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    /// 尚未安装系统事件处理器
    Uninitialized,
    /// 事件处理器已安装
    Active,
    /// 已关闭，终态
    ShutDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "Uninitialized"),
            LifecycleState::Active => write!(f, "Active"),
            LifecycleState::ShutDown => write!(f, "ShutDown"),
        }
    }
}

struct ActiveState {
    registry: Arc<HotkeyRegistry>,
    dispatcher: EventDispatcher,
}

enum ManagerState {
    Uninitialized,
    Active(ActiveState),
    ShutDown,
}

impl ManagerState {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            ManagerState::Uninitialized => LifecycleState::Uninitialized,
            ManagerState::Active(_) => LifecycleState::Active,
            ManagerState::ShutDown => LifecycleState::ShutDown,
        }
    }
}

/// 快捷键管理器
pub struct HotkeyManager {
    backend: Arc<dyn BackendAdapter>,
    config: DispatchConfig,
    state: Mutex<ManagerState>,
}

impl fmt::Debug for HotkeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotkeyManager")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl HotkeyManager {
    /// 创建新的快捷键管理器，使用默认分发配置
    pub fn new(backend: impl BackendAdapter + 'static) -> Self {
        Self::with_config(backend, DispatchConfig::default())
    }

    pub fn with_config(backend: impl BackendAdapter + 'static, config: DispatchConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            state: Mutex::new(ManagerState::Uninitialized),
        }
    }

    /// 注册全局快捷键
    ///
    /// 回调在分发器上执行（threaded 模式为独立线程），执行期间不持有任何内部锁，
    /// 因此可以在回调中再次注册或注销
    pub fn register<F>(
        &self,
        combination: HotkeyCombination,
        handler: F,
    ) -> Result<RegistrationId, HotkeyError>
    where
        F: Fn(HotkeyEvent) + Send + Sync + 'static,
    {
        if self.state() == LifecycleState::ShutDown {
            return Err(HotkeyError::ManagerShutDown);
        }
        if !self.backend.supports_key(combination.key()) {
            return Err(HotkeyError::InvalidKey(format!(
                "{} is not supported by the {} backend",
                combination.key(),
                self.backend.name()
            )));
        }

        let registry = self.active_registry()?;
        registry.insert(combination, Arc::new(handler))
    }

    /// 注销快捷键
    pub fn unregister(&self, id: RegistrationId) -> Result<(), HotkeyError> {
        let registry = match &*self.state.lock() {
            ManagerState::Active(active) => active.registry.clone(),
            ManagerState::Uninitialized => return Err(HotkeyError::UnknownRegistration(id)),
            ManagerState::ShutDown => return Err(HotkeyError::ManagerShutDown),
        };
        registry.remove(id)
    }

    /// 注销全部快捷键，系统事件处理器保持安装，之后仍可注册
    pub fn unregister_all(&self) -> Result<TeardownReport, HotkeyError> {
        let registry = match &*self.state.lock() {
            ManagerState::Active(active) => active.registry.clone(),
            ManagerState::Uninitialized => return Ok(TeardownReport::default()),
            ManagerState::ShutDown => return Err(HotkeyError::ManagerShutDown),
        };
        Ok(registry.unregister_all())
    }

    /// 注销全部快捷键并卸载系统事件处理器
    ///
    /// 可重复调用，第二次起返回空报告
    pub fn shutdown(&self) -> TeardownReport {
        let previous = std::mem::replace(&mut *self.state.lock(), ManagerState::ShutDown);

        match previous {
            ManagerState::ShutDown => TeardownReport::default(),
            ManagerState::Uninitialized => {
                tracing::info!("Hotkey manager shut down before any hotkey was registered");
                TeardownReport::default()
            }
            ManagerState::Active(mut active) => {
                let mut report = active.registry.clear_all();
                if let Err(e) = self.backend.uninstall() {
                    tracing::warn!("Failed to uninstall hotkey event handler: {}", e);
                    report.uninstall_error = Some(e);
                }
                active.dispatcher.stop();
                tracing::info!(
                    "Hotkey manager shut down ({} registrations removed, {} failures)",
                    report.unregistered,
                    report.failures.len() + usize::from(report.uninstall_error.is_some())
                );
                report
            }
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().lifecycle()
    }

    /// 检查组合键是否已注册
    pub fn is_registered(&self, combination: &HotkeyCombination) -> bool {
        self.registry()
            .is_some_and(|registry| registry.contains(combination))
    }

    /// 获取所有已注册的快捷键
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        self.registry()
            .map(|registry| registry.snapshot())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.registry().map_or(0, |registry| registry.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 分发统计，未激活时为零
    pub fn stats(&self) -> DispatchStats {
        match &*self.state.lock() {
            ManagerState::Active(active) => active.dispatcher.stats(),
            _ => DispatchStats::default(),
        }
    }

    fn registry(&self) -> Option<Arc<HotkeyRegistry>> {
        match &*self.state.lock() {
            ManagerState::Active(active) => Some(active.registry.clone()),
            _ => None,
        }
    }

    /// 获取注册表，首次调用时安装系统事件处理器
    fn active_registry(&self) -> Result<Arc<HotkeyRegistry>, HotkeyError> {
        let mut state = self.state.lock();
        match &*state {
            ManagerState::Active(active) => return Ok(active.registry.clone()),
            ManagerState::ShutDown => return Err(HotkeyError::ManagerShutDown),
            ManagerState::Uninitialized => {}
        }

        let registry = Arc::new(HotkeyRegistry::new(self.backend.clone()));
        let mut dispatcher = EventDispatcher::start(registry.clone(), &self.config)?;

        if let Err(e) = self.backend.install(dispatcher.sink()) {
            tracing::error!(
                "Failed to install hotkey event handler on {} backend: {}",
                self.backend.name(),
                e
            );
            dispatcher.stop();
            return Err(e.into());
        }

        tracing::info!("Hotkey event handler installed on {} backend", self.backend.name());
        *state = ManagerState::Active(ActiveState {
            registry: registry.clone(),
            dispatcher,
        });
        Ok(registry)
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        let report = self.shutdown();
        if !report.is_clean() {
            tracing::warn!("Hotkey manager dropped with teardown failures: {:?}", report);
        }
    }
}
