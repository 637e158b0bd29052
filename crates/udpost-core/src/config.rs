//! 应用配置和持久化
//!
//! 提供监听地址、目标主机、保存目录和发送节奏等设置的存储和读取。

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::transfer::Pacing;
use crate::transfer::protocol::{DEFAULT_HOST, DEFAULT_PORT};

/// 应用设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 接收端监听地址
    pub listen_addr: String,
    /// 接收端监听端口
    pub listen_port: u16,
    /// 发送端目标主机
    pub server_host: String,
    /// 发送端目标端口
    pub server_port: u16,
    /// 接收到的附件保存目录
    pub output_dir: PathBuf,
    /// 元数据之后的停顿 (毫秒)
    pub after_metadata_ms: u64,
    /// 数据块之间的停顿 (毫秒)
    pub between_chunks_ms: u64,
    /// 发送 EOF 之前的停顿 (毫秒)
    pub before_sentinel_ms: u64,
    /// 详细日志模式
    pub verbose: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let pacing = Pacing::default();
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: DEFAULT_PORT,
            server_host: DEFAULT_HOST.to_string(),
            server_port: DEFAULT_PORT,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            after_metadata_ms: pacing.after_metadata.as_millis() as u64,
            between_chunks_ms: pacing.between_chunks.as_millis() as u64,
            before_sentinel_ms: pacing.before_sentinel.as_millis() as u64,
            verbose: false,
        }
    }
}

impl AppSettings {
    /// 获取配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("udpost");
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

    /// 发送节奏
    pub fn pacing(&self) -> Pacing {
        Pacing {
            after_metadata: Duration::from_millis(self.after_metadata_ms),
            between_chunks: Duration::from_millis(self.between_chunks_ms),
            before_sentinel: Duration::from_millis(self.before_sentinel_ms),
        }
    }
}
