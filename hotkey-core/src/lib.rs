//! 全局快捷键核心库
//!
//! 注册系统级组合键、跨线程安全地接收按键通知，并可确定性地注销。
//! 各平台的系统接口通过 [`BackendAdapter`] 接入

mod error;
mod events;
mod modules;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub use error::{BackendError, BackendOperation, ConfigError, ErrorCode, HotkeyError};
pub use events::HotkeyEvent;
pub use modules::config::{ConfigManager, HotkeyConfig};
pub use modules::shortcut::{
    BackendAdapter, BackendToken, DispatchConfig, DispatchMode, DispatchStats, EventDispatcher,
    HotkeyCombination, HotkeyHandler, HotkeyManager, HotkeyRegistry, InMemoryBackend, KeyCode,
    LifecycleState, Modifiers, NotificationSink, Registration, RegistrationId, RegistrationInfo,
    TeardownReport,
};

/// 初始化日志
///
/// 日志级别取自 `RUST_LOG`，默认 info；重复调用不会报错
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        tracing::debug!("Tracing subscriber already installed: {}", e);
    }
    Ok(())
}
