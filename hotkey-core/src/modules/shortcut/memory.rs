//! 内存快捷键接口
//!
//! 不依赖操作系统的完整实现，用于测试和无界面环境：
//! 支持故障注入、按键表限制以及模拟按键

use super::backend::{BackendAdapter, BackendToken};
use super::combination::{HotkeyCombination, KeyCode};
use super::dispatcher::NotificationSink;
use crate::error::{BackendError, BackendOperation};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct MemoryState {
    sink: Option<NotificationSink>,
    active: HashMap<BackendToken, HotkeyCombination>,
    next_token: u64,
    unsupported: HashSet<KeyCode>,
    fail_install: Option<i32>,
    fail_next_register: Option<i32>,
    fail_unregister: Option<i32>,
    register_calls: usize,
    unregister_calls: usize,
}

/// 内存快捷键接口
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记平台不支持的按键
    pub fn mark_unsupported(&self, key: KeyCode) {
        self.state.lock().unsupported.insert(key);
    }

    /// 下一次 install 失败
    pub fn fail_install(&self, status: i32) {
        self.state.lock().fail_install = Some(status);
    }

    /// 下一次 register 失败
    pub fn fail_next_register(&self, status: i32) {
        self.state.lock().fail_next_register = Some(status);
    }

    /// 设置后所有 unregister 都返回该状态码（注册仍会被移除），None 恢复正常
    pub fn fail_unregister(&self, status: Option<i32>) {
        self.state.lock().fail_unregister = status;
    }

    pub fn is_installed(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn register_calls(&self) -> usize {
        self.state.lock().register_calls
    }

    pub fn unregister_calls(&self) -> usize {
        self.state.lock().unregister_calls
    }

    /// 查询组合键当前的令牌
    pub fn token_for(&self, combo: &HotkeyCombination) -> Option<BackendToken> {
        self.state
            .lock()
            .active
            .iter()
            .find(|(_, active)| *active == combo)
            .map(|(token, _)| *token)
    }

    /// 模拟按下已注册的组合键，未注册或未安装处理器时返回 false
    pub fn press(&self, combo: &HotkeyCombination) -> bool {
        match self.token_for(combo) {
            Some(token) => self.press_token(token),
            None => false,
        }
    }

    /// 直接投递令牌，不检查是否仍处于注册状态
    ///
    /// 用于模拟注销与在途通知之间的竞争
    pub fn press_token(&self, token: BackendToken) -> bool {
        // 投递时不能持有自身的锁，inline 模式下回调可能再次调用本接口
        let sink = self.state.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink.notify(token);
                true
            }
            None => false,
        }
    }
}

impl BackendAdapter for InMemoryBackend {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn supports_key(&self, key: KeyCode) -> bool {
        !self.state.lock().unsupported.contains(&key)
    }

    fn install(&self, sink: NotificationSink) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_install.take() {
            return Err(BackendError::new(
                BackendOperation::Install,
                status,
                "event handler installation rejected",
            ));
        }
        if state.sink.is_some() {
            return Err(BackendError::new(
                BackendOperation::Install,
                -1,
                "an event handler is already installed",
            ));
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn uninstall(&self) -> Result<(), BackendError> {
        match self.state.lock().sink.take() {
            Some(_) => Ok(()),
            None => Err(BackendError::new(
                BackendOperation::Uninstall,
                -1,
                "no event handler installed",
            )),
        }
    }

    fn register(&self, combo: &HotkeyCombination) -> Result<BackendToken, BackendError> {
        let mut state = self.state.lock();
        state.register_calls += 1;

        if let Some(status) = state.fail_next_register.take() {
            return Err(BackendError::new(
                BackendOperation::Register,
                status,
                format!("registration of {} rejected", combo),
            ));
        }
        if state.unsupported.contains(&combo.key()) {
            return Err(BackendError::new(
                BackendOperation::Register,
                -1,
                format!("key {} has no platform key code", combo.key()),
            ));
        }

        state.next_token += 1;
        let token = BackendToken::new(state.next_token);
        state.active.insert(token, *combo);
        Ok(token)
    }

    fn unregister(&self, token: BackendToken) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.unregister_calls += 1;

        let removed = state.active.remove(&token);
        if let Some(status) = state.fail_unregister {
            return Err(BackendError::new(
                BackendOperation::Unregister,
                status,
                format!("unregistration of {} rejected", token),
            ));
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(BackendError::new(
                BackendOperation::Unregister,
                -1,
                format!("{} is not registered", token),
            )),
        }
    }
}
