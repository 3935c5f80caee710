//! 配置管理器

use crate::error::ConfigError;
use crate::modules::shortcut::{DispatchConfig, HotkeyCombination};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILE: &str = "hotkeys.toml";

/// 快捷键配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HotkeyConfig {
    /// 分发设置
    pub dispatch: DispatchConfig,
    /// 动作名 -> 快捷键字符串，例如 `toggle = "CmdOrCtrl+Shift+S"`
    pub bindings: BTreeMap<String, String>,
}

impl HotkeyConfig {
    /// 解析全部绑定，任何一项无效即返回错误
    pub fn parsed_bindings(&self) -> Result<Vec<(String, HotkeyCombination)>, ConfigError> {
        self.bindings
            .iter()
            .map(|(action, accelerator)| {
                accelerator
                    .parse::<HotkeyCombination>()
                    .map(|combo| (action.clone(), combo))
                    .map_err(|e| ConfigError::InvalidBinding {
                        action: action.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: ArcSwap<HotkeyConfig>,
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hotkey-core");
        Self::new(config_dir)
    }
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join(CONFIG_FILE);
        let config = ArcSwap::new(Arc::new(HotkeyConfig::default()));
        Self { config, config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// 从磁盘加载配置，文件不存在时返回默认值
    pub fn load(&self) -> Result<HotkeyConfig, ConfigError> {
        if !self.config_path.exists() {
            tracing::debug!("Config file {} not found, using defaults", self.config_path.display());
            return Ok(HotkeyConfig::default());
        }
        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        let config: HotkeyConfig =
            toml::from_str(&content).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        if config.dispatch.queue_capacity == Some(0) {
            return Err(ConfigError::LoadFailed(
                "dispatch.queue_capacity must be at least 1".to_string(),
            ));
        }
        self.config.store(Arc::new(config.clone()));
        Ok(config)
    }

    pub fn save(&self, config: &HotkeyConfig) -> Result<(), ConfigError> {
        let content = toml::to_string(config).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }
        std::fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        self.config.store(Arc::new(config.clone()));
        Ok(())
    }

    pub fn current(&self) -> Arc<HotkeyConfig> {
        self.config.load_full()
    }

    pub fn update<F>(&self, f: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut HotkeyConfig),
    {
        let mut config = (*self.current()).clone();
        f(&mut config);
        self.save(&config)
    }
}
