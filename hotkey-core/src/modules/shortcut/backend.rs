//! 系统快捷键接口抽象
//!
//! 每个平台提供一个实现：负责向操作系统注册/注销组合键，
//! 并在组合键被按下时通过 [`NotificationSink`] 推送对应的令牌

use super::combination::{HotkeyCombination, KeyCode};
use super::dispatcher::NotificationSink;
use crate::error::BackendError;
use auto_impl::auto_impl;
use std::fmt;

/// 系统注册时返回的不透明句柄，用于把按键通知关联回注册项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendToken(u64);

impl BackendToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BackendToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

/// 平台快捷键接口
///
/// 通知可能来自任意线程（包括系统事件循环持有的线程），
/// 实现方只需把令牌交给 `install` 收到的 sink，不得直接调用应用回调
#[auto_impl(&, Box, Arc)]
pub trait BackendAdapter: Send + Sync {
    /// 接口名称，用于日志
    fn name(&self) -> &str;

    /// 平台按键表是否支持该按键
    fn supports_key(&self, _key: KeyCode) -> bool {
        true
    }

    /// 安装进程级事件处理器，同一时刻只允许一个
    fn install(&self, sink: NotificationSink) -> Result<(), BackendError>;

    /// 卸载事件处理器
    fn uninstall(&self) -> Result<(), BackendError>;

    /// 向系统注册组合键
    fn register(&self, combo: &HotkeyCombination) -> Result<BackendToken, BackendError>;

    /// 向系统注销组合键
    fn unregister(&self, token: BackendToken) -> Result<(), BackendError>;
}
