//! 接收端工作流
//!
//! 高层 API 封装完整的接收流程:
//! 1. 绑定 UDP 端口
//! 2. 逐个处理数据报，重组文件和图片
//! 3. 收到 EOF 后交给通知方并重置会话

use log::info;

use crate::config::AppSettings;
use crate::notify::Notifier;
use crate::transfer::Reassembler;
use crate::transfer::protocol::DEFAULT_PORT;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// 接收选项
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// 监听地址
    pub listen_addr: String,
    /// 监听端口 (0 表示随机端口)
    pub port: u16,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ReceiveOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            listen_addr: settings.listen_addr.clone(),
            port: settings.listen_port,
        }
    }
}

/// 接收端工作流
pub struct Receiver {
    socket: UdpSocket,
}

impl Receiver {
    /// 绑定监听端口
    pub async fn bind(options: &ReceiveOptions) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind((options.listen_addr.as_str(), options.port)).await?;
        info!("UDP receiver listening on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 开始接收，直到进程退出
    pub async fn serve<N: Notifier>(self, notifier: N) {
        let mut reassembler = Reassembler::new(notifier);
        reassembler.run(&self.socket).await;
    }
}
