//! 快捷键注册表
//!
//! 注册项的唯一数据源。所有增删都与系统注册/注销在同一把锁内成对完成，
//! 保证不存在"注册表有记录但系统未注册"或反之的孤儿状态

use super::backend::{BackendAdapter, BackendToken};
use super::combination::HotkeyCombination;
use crate::error::{BackendError, BackendOperation, HotkeyError};
use crate::events::HotkeyEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 应用回调
pub type HotkeyHandler = Arc<dyn Fn(HotkeyEvent) + Send + Sync>;

/// 注册 ID
///
/// 单调分配，活跃期间不会重复
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RegistrationId(u32);

impl RegistrationId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 注册项
#[derive(Clone)]
pub struct Registration {
    pub id: RegistrationId,
    pub combination: HotkeyCombination,
    pub handler: HotkeyHandler,
    pub token: BackendToken,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("combination", &self.combination)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// 注册项快照（不含回调）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub id: RegistrationId,
    pub combination: HotkeyCombination,
}

/// 批量注销结果
///
/// 注销失败不会中断清理，失败项被收集在此
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// 已移除的注册项数量
    pub unregistered: usize,
    /// 系统注销失败的注册项
    pub failures: Vec<(RegistrationId, BackendError)>,
    /// 卸载事件处理器失败
    pub uninstall_error: Option<BackendError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.uninstall_error.is_none()
    }
}

#[derive(Debug)]
struct RegistryState {
    entries: HashMap<RegistrationId, Registration>,
    by_token: HashMap<BackendToken, RegistrationId>,
    by_combination: HashMap<HotkeyCombination, RegistrationId>,
    next_id: u32,
    closed: bool,
}

impl RegistryState {
    /// 下一个可用 ID；回绕后跳过 0 和仍在使用的 ID
    fn peek_id(&self) -> RegistrationId {
        let mut candidate = self.next_id;
        loop {
            if candidate != 0 && !self.entries.contains_key(&RegistrationId(candidate)) {
                return RegistrationId(candidate);
            }
            candidate = candidate.wrapping_add(1);
        }
    }
}

/// 快捷键注册表
pub struct HotkeyRegistry {
    backend: Arc<dyn BackendAdapter>,
    state: Mutex<RegistryState>,
}

impl fmt::Debug for HotkeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotkeyRegistry")
            .field("backend", &self.backend.name())
            .field("len", &self.len())
            .finish()
    }
}

impl HotkeyRegistry {
    pub fn new(backend: Arc<dyn BackendAdapter>) -> Self {
        Self {
            backend,
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                by_token: HashMap::new(),
                by_combination: HashMap::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    /// 注册组合键
    ///
    /// 系统注册失败时不插入任何记录，也不消耗 ID
    pub fn insert(
        &self,
        combination: HotkeyCombination,
        handler: HotkeyHandler,
    ) -> Result<RegistrationId, HotkeyError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(HotkeyError::ManagerShutDown);
        }
        if state.by_combination.contains_key(&combination) {
            return Err(HotkeyError::DuplicateRegistration(combination));
        }

        let id = state.peek_id();
        let token = self.backend.register(&combination)?;

        if state.by_token.contains_key(&token) {
            tracing::error!(
                "Backend {} returned token {} that is already in use",
                self.backend.name(),
                token
            );
            return Err(HotkeyError::Backend(BackendError::new(
                BackendOperation::Register,
                -1,
                format!("{} is already bound to another registration", token),
            )));
        }

        state.next_id = id.0.wrapping_add(1);
        state.by_token.insert(token, id);
        state.by_combination.insert(combination, id);
        state.entries.insert(
            id,
            Registration {
                id,
                combination,
                handler,
                token,
            },
        );

        tracing::info!("Registered hotkey {} as #{} ({})", combination, id, token);
        Ok(id)
    }

    /// 注销组合键
    ///
    /// 系统注销失败只记录日志，记录照常移除
    pub fn remove(&self, id: RegistrationId) -> Result<(), HotkeyError> {
        let mut state = self.state.lock();

        let registration = state
            .entries
            .remove(&id)
            .ok_or(HotkeyError::UnknownRegistration(id))?;
        state.by_token.remove(&registration.token);
        state.by_combination.remove(&registration.combination);

        if let Err(e) = self.backend.unregister(registration.token) {
            tracing::warn!(
                "Failed to unregister hotkey {} (#{}) from backend: {}",
                registration.combination,
                id,
                e
            );
        } else {
            tracing::info!("Unregistered hotkey {} (#{})", registration.combination, id);
        }
        Ok(())
    }

    /// 按令牌查找注册项，用于把按键通知映射回回调
    pub fn lookup_by_token(&self, token: BackendToken) -> Option<Registration> {
        let state = self.state.lock();
        state
            .by_token
            .get(&token)
            .and_then(|id| state.entries.get(id))
            .cloned()
    }

    /// 注销全部注册项，注册表保持可用
    ///
    /// 单项失败不影响其余项
    pub fn unregister_all(&self) -> TeardownReport {
        let mut state = self.state.lock();
        self.drain(&mut state)
    }

    /// 注销全部注册项并关闭注册表，之后的 insert 返回 `ManagerShutDown`
    pub fn clear_all(&self) -> TeardownReport {
        let mut state = self.state.lock();
        state.closed = true;
        self.drain(&mut state)
    }

    fn drain(&self, state: &mut RegistryState) -> TeardownReport {
        let mut report = TeardownReport::default();
        let mut registrations: Vec<Registration> =
            state.entries.drain().map(|(_, registration)| registration).collect();
        registrations.sort_by_key(|registration| registration.id);
        state.by_token.clear();
        state.by_combination.clear();

        for registration in registrations {
            report.unregistered += 1;
            if let Err(e) = self.backend.unregister(registration.token) {
                tracing::warn!(
                    "Failed to unregister hotkey {} (#{}) during teardown: {}",
                    registration.combination,
                    registration.id,
                    e
                );
                report.failures.push((registration.id, e));
            }
        }

        if report.unregistered > 0 {
            tracing::info!(
                "Cleared {} hotkey registrations ({} failures)",
                report.unregistered,
                report.failures.len()
            );
        }
        report
    }

    pub fn contains(&self, combination: &HotkeyCombination) -> bool {
        self.state.lock().by_combination.contains_key(combination)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前注册项快照，按 ID 排序
    pub fn snapshot(&self) -> Vec<RegistrationInfo> {
        let state = self.state.lock();
        let mut infos: Vec<RegistrationInfo> = state
            .entries
            .values()
            .map(|registration| RegistrationInfo {
                id: registration.id,
                combination: registration.combination,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::shortcut::memory::InMemoryBackend;
    use crate::modules::shortcut::{KeyCode, Modifiers};

    fn noop() -> HotkeyHandler {
        Arc::new(|_: HotkeyEvent| {})
    }

    fn combo(key: KeyCode) -> HotkeyCombination {
        HotkeyCombination::new(Modifiers::CONTROL, key)
    }

    fn registry() -> (Arc<InMemoryBackend>, HotkeyRegistry) {
        let backend = Arc::new(InMemoryBackend::new());
        let registry = HotkeyRegistry::new(backend.clone());
        (backend, registry)
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let (backend, registry) = registry();
        let a = registry.insert(combo(KeyCode::A), noop()).unwrap();
        let b = registry.insert(combo(KeyCode::B), noop()).unwrap();
        assert_eq!(a, RegistrationId::new(1));
        assert_eq!(b, RegistrationId::new(2));
        assert_eq!(backend.active_count(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_insert_duplicate_does_not_touch_backend() {
        let (backend, registry) = registry();
        registry.insert(combo(KeyCode::A), noop()).unwrap();
        let calls = backend.register_calls();

        let result = registry.insert(combo(KeyCode::A), noop());
        assert_eq!(result, Err(HotkeyError::DuplicateRegistration(combo(KeyCode::A))));
        assert_eq!(backend.register_calls(), calls);
        assert_eq!(registry.len(), 1);

        // 重复项被拒绝后不消耗 ID
        let next = registry.insert(combo(KeyCode::B), noop()).unwrap();
        assert_eq!(next, RegistrationId::new(2));
    }

    #[test]
    fn test_insert_backend_failure_is_atomic() {
        let (backend, registry) = registry();
        backend.fail_next_register(-9878);

        let result = registry.insert(combo(KeyCode::A), noop());
        assert!(matches!(result, Err(HotkeyError::Backend(ref e)) if e.status == -9878));
        assert!(registry.is_empty());
        assert!(!registry.contains(&combo(KeyCode::A)));

        let id = registry.insert(combo(KeyCode::A), noop()).unwrap();
        assert_eq!(id, RegistrationId::new(1));
    }

    #[test]
    fn test_remove_unknown_fails() {
        let (_backend, registry) = registry();
        let id = RegistrationId::new(42);
        assert_eq!(registry.remove(id), Err(HotkeyError::UnknownRegistration(id)));
    }

    #[test]
    fn test_remove_twice_fails_second_time() {
        let (backend, registry) = registry();
        let id = registry.insert(combo(KeyCode::A), noop()).unwrap();
        registry.remove(id).unwrap();
        assert_eq!(backend.active_count(), 0);
        assert_eq!(registry.remove(id), Err(HotkeyError::UnknownRegistration(id)));
    }

    #[test]
    fn test_remove_tolerates_backend_failure() {
        let (backend, registry) = registry();
        let id = registry.insert(combo(KeyCode::A), noop()).unwrap();
        backend.fail_unregister(Some(5));

        assert!(registry.remove(id).is_ok());
        assert!(registry.is_empty());
        assert!(registry.lookup_by_token(BackendToken::new(1)).is_none());
    }

    #[test]
    fn test_lookup_by_token() {
        let (backend, registry) = registry();
        let id = registry.insert(combo(KeyCode::A), noop()).unwrap();
        let token = backend.token_for(&combo(KeyCode::A)).unwrap();

        let registration = registry.lookup_by_token(token).unwrap();
        assert_eq!(registration.id, id);
        assert_eq!(registration.combination, combo(KeyCode::A));

        registry.remove(id).unwrap();
        assert!(registry.lookup_by_token(token).is_none());
    }

    #[test]
    fn test_clear_all_empty_is_safe() {
        let (_backend, registry) = registry();
        let report = registry.clear_all();
        assert_eq!(report, TeardownReport::default());
        assert!(report.is_clean());
    }

    #[test]
    fn test_clear_all_collects_failures_and_continues() {
        let (backend, registry) = registry();
        registry.insert(combo(KeyCode::A), noop()).unwrap();
        registry.insert(combo(KeyCode::B), noop()).unwrap();
        registry.insert(combo(KeyCode::C), noop()).unwrap();
        backend.fail_unregister(Some(3));

        let report = registry.clear_all();
        assert_eq!(report.unregistered, 3);
        assert_eq!(report.failures.len(), 3);
        assert!(registry.is_empty());
        assert_eq!(backend.unregister_calls(), 3);
    }

    #[test]
    fn test_insert_after_clear_all_rejected() {
        let (backend, registry) = registry();
        registry.clear_all();
        assert_eq!(
            registry.insert(combo(KeyCode::A), noop()),
            Err(HotkeyError::ManagerShutDown)
        );
        assert_eq!(backend.register_calls(), 0);
    }

    #[test]
    fn test_unregister_all_keeps_registry_open() {
        let (backend, registry) = registry();
        registry.insert(combo(KeyCode::A), noop()).unwrap();
        registry.insert(combo(KeyCode::B), noop()).unwrap();

        let report = registry.unregister_all();
        assert_eq!(report.unregistered, 2);
        assert!(report.is_clean());
        assert!(registry.is_empty());
        assert_eq!(backend.active_count(), 0);

        let id = registry.insert(combo(KeyCode::A), noop()).unwrap();
        assert_eq!(id, RegistrationId::new(3));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let (_backend, registry) = registry();
        registry.insert(combo(KeyCode::C), noop()).unwrap();
        registry.insert(combo(KeyCode::A), noop()).unwrap();
        let ids: Vec<u32> = registry.snapshot().iter().map(|info| info.id.raw()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
