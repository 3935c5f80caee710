//! 全局快捷键错误类型定义
//!
//! 所有模块的错误类型统一在此定义，使用 thiserror 自动派生 Error trait

use crate::modules::shortcut::{HotkeyCombination, RegistrationId};
use std::fmt;
use thiserror::Error;

/// 快捷键管理器统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    /// 按键标识无法识别，或当前平台不支持
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// 相同组合键已注册
    #[error("Hotkey already registered: {0}")]
    DuplicateRegistration(HotkeyCombination),

    /// 注册 ID 不存在（包括已注销的 ID）
    #[error("Unknown registration: {0}")]
    UnknownRegistration(RegistrationId),

    /// 系统快捷键接口调用失败
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// 管理器已关闭
    #[error("Hotkey manager has been shut down")]
    ManagerShutDown,

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 系统快捷键接口的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    Install,
    Uninstall,
    Register,
    Unregister,
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOperation::Install => write!(f, "install"),
            BackendOperation::Uninstall => write!(f, "uninstall"),
            BackendOperation::Register => write!(f, "register"),
            BackendOperation::Unregister => write!(f, "unregister"),
        }
    }
}

/// 系统快捷键接口错误
///
/// 包装操作系统返回的状态码
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Backend {operation} failed (status {status}): {message}")]
pub struct BackendError {
    pub operation: BackendOperation,
    pub status: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(operation: BackendOperation, status: i32, message: impl Into<String>) -> Self {
        Self {
            operation,
            status,
            message: message.into(),
        }
    }
}

/// 配置相关错误
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid binding '{action}': {reason}")]
    InvalidBinding { action: String, reason: String },
}

/// 错误代码（用于日志和上层展示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidKey,
    DuplicateRegistration,
    UnknownRegistration,
    BackendFailed,
    ManagerShutDown,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidKey => write!(f, "HOTKEY_INVALID_KEY"),
            ErrorCode::DuplicateRegistration => write!(f, "HOTKEY_DUPLICATE_REGISTRATION"),
            ErrorCode::UnknownRegistration => write!(f, "HOTKEY_UNKNOWN_REGISTRATION"),
            ErrorCode::BackendFailed => write!(f, "HOTKEY_BACKEND_FAILED"),
            ErrorCode::ManagerShutDown => write!(f, "HOTKEY_MANAGER_SHUT_DOWN"),
            ErrorCode::Internal => write!(f, "HOTKEY_INTERNAL"),
        }
    }
}

impl HotkeyError {
    /// 获取对应的错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            HotkeyError::InvalidKey(_) => ErrorCode::InvalidKey,
            HotkeyError::DuplicateRegistration(_) => ErrorCode::DuplicateRegistration,
            HotkeyError::UnknownRegistration(_) => ErrorCode::UnknownRegistration,
            HotkeyError::Backend(_) => ErrorCode::BackendFailed,
            HotkeyError::ManagerShutDown => ErrorCode::ManagerShutDown,
            HotkeyError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// 检查是否为可恢复错误
    ///
    /// 系统调用失败可能是暂时的（例如组合键被其他程序占用），其余错误重试无意义
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HotkeyError::Backend(_))
    }
}
