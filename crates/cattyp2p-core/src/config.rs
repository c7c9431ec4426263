//! 驱动设置和持久化
//!
//! 提供控制 socket 目录、接口名、各类超时的存储和读取。

use std::fs;
use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};

/// 驱动设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    /// 控制 socket 目录（wpa_supplicant 默认路径）
    pub ctrl_dir: PathBuf,
    /// 网络接口名称（通常是 wlan0）
    pub interface: String,
    /// 对端发现的默认截止时间（秒，1 秒粒度轮询）
    pub discovery_timeout_secs: u64,
    /// GO 自建组的组建截止时间（秒）
    pub formation_timeout_secs: u64,
    /// 事件等待的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            ctrl_dir: PathBuf::from("/var/run/wpa_supplicant"),
            interface: "wlan0".to_string(),
            discovery_timeout_secs: 15,
            formation_timeout_secs: 5,
            poll_interval_ms: 100,
        }
    }
}

impl DriverSettings {
    /// 获取配置文件路径
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cattyp2p");
        config_dir.join("settings.toml")
    }

    /// 加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = DriverSettings::default();

        assert_eq!(settings.ctrl_dir, PathBuf::from("/var/run/wpa_supplicant"));
        assert_eq!(settings.interface, "wlan0");
        assert_eq!(settings.discovery_timeout_secs, 15);
        assert_eq!(settings.formation_timeout_secs, 5);
        assert_eq!(settings.poll_interval_ms, 100);
    }

    #[test]
    fn test_settings_toml_roundtrip() {
        let settings = DriverSettings {
            interface: "wlp3s0".to_string(),
            discovery_timeout_secs: 30,
            ..Default::default()
        };

        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: DriverSettings = toml::from_str(&text).unwrap();

        assert_eq!(parsed.interface, "wlp3s0");
        assert_eq!(parsed.discovery_timeout_secs, 30);
    }
}
