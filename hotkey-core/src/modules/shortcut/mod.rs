//! 快捷键模块
//!
//! 提供全局快捷键注册、分发与生命周期管理

pub mod backend;
pub mod combination;
pub mod dispatcher;
pub mod manager;
pub mod memory;
pub mod registry;

pub use backend::{BackendAdapter, BackendToken};
pub use combination::{HotkeyCombination, KeyCode, Modifiers};
pub use dispatcher::{
    DispatchConfig, DispatchMode, DispatchStats, EventDispatcher, NotificationSink,
};
pub use manager::{HotkeyManager, LifecycleState};
pub use memory::InMemoryBackend;
pub use registry::{
    HotkeyHandler, HotkeyRegistry, Registration, RegistrationId, RegistrationInfo, TeardownReport,
};
