//! 事件模块
//!
//! 定义投递给应用回调的快捷键事件

use crate::modules::shortcut::{HotkeyCombination, RegistrationId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 快捷键按下事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotkeyEvent {
    /// 注册 ID
    pub id: RegistrationId,
    /// 被按下的组合键
    pub combination: HotkeyCombination,
    /// 通知进入分发器时分配的序号，单调递增
    pub sequence: u64,
    /// 收到系统通知的时间
    pub pressed_at: DateTime<Utc>,
}
