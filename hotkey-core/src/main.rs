//! 演示程序：从配置加载快捷键绑定，在内存接口上模拟按键

use anyhow::{Context, Result};
use hotkey_core::{ConfigManager, HotkeyEvent, HotkeyManager, InMemoryBackend, init_tracing};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    init_tracing()?;

    let config_manager = ConfigManager::default();
    let mut config = config_manager.load().context("failed to load hotkey config")?;
    if config.bindings.is_empty() {
        config
            .bindings
            .insert("toggle".to_string(), "CmdOrCtrl+Shift+S".to_string());
        config
            .bindings
            .insert("launcher".to_string(), "Alt+Space".to_string());
    }

    let backend = Arc::new(InMemoryBackend::new());
    let manager = HotkeyManager::with_config(backend.clone(), config.dispatch.clone());
    let (tx, rx) = crossbeam::channel::unbounded::<(String, HotkeyEvent)>();

    let bindings = config.parsed_bindings()?;
    for (action, combination) in &bindings {
        let tx = tx.clone();
        let action_name = action.clone();
        let id = manager.register(*combination, move |event: HotkeyEvent| {
            let _ = tx.send((action_name.clone(), event));
        })?;
        tracing::info!("Bound '{}' to {} (#{})", action, combination, id);
    }
    drop(tx);

    for (_, combination) in &bindings {
        backend.press(combination);
    }

    for _ in 0..bindings.len() {
        let (action, event) = rx
            .recv_timeout(Duration::from_secs(1))
            .context("hotkey event was not delivered")?;
        tracing::info!(
            "Action '{}' triggered by {} (sequence {})",
            action,
            event.combination,
            event.sequence
        );
    }

    println!("{}", serde_json::to_string_pretty(&manager.stats())?);
    let report = manager.shutdown();
    tracing::info!("Shutdown complete: {} registrations removed", report.unregistered);
    Ok(())
}
