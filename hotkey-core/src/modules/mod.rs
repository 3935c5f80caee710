//! 核心模块
//!
//! 包含快捷键管理与配置管理

pub mod config;
pub mod shortcut;
