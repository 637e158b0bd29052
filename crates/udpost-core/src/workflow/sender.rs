//! 发送端工作流
//!
//! 高层 API 封装完整的发送流程:
//! 1. 解析接收端地址
//! 2. 绑定临时 UDP 端口
//! 3. 发送元数据、数据块和 EOF

use crate::config::AppSettings;
use crate::transfer::protocol::{DEFAULT_HOST, DEFAULT_PORT};
use crate::transfer::{
    Pacing, PayloadKind, SendProgressCallback, TransferError, TransferReport, TransferRequest,
    UdpSink, send_transfer,
};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// 发送选项
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// 接收端主机
    pub host: String,
    /// 接收端端口
    pub port: u16,
    /// 发送节奏
    pub pacing: Pacing,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            pacing: Pacing::default(),
        }
    }
}

impl SendOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            host: settings.server_host.clone(),
            port: settings.server_port,
            pacing: settings.pacing(),
        }
    }
}

/// 发送端工作流
pub struct Sender {
    options: SendOptions,
}

impl Sender {
    pub fn new(options: SendOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SendOptions {
        &self.options
    }

    /// 解析接收端地址，取第一个结果
    pub async fn resolve(&self) -> Result<SocketAddr, TransferError> {
        let host = self.options.host.as_str();
        let port = self.options.port;
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| TransferError::Resolve(format!("{}:{}: {}", host, port, e)))?;
        addrs
            .next()
            .ok_or_else(|| TransferError::Resolve(format!("{}:{}", host, port)))
    }

    /// 发送一次传输
    pub async fn send<C: SendProgressCallback>(
        &self,
        request: &TransferRequest,
        callback: &C,
    ) -> anyhow::Result<TransferReport> {
        let result = self.try_send(request, callback).await;
        if let Err(e) = &result {
            callback.on_error(&e.to_string());
        }
        Ok(result?)
    }

    async fn try_send<C: SendProgressCallback>(
        &self,
        request: &TransferRequest,
        callback: &C,
    ) -> Result<TransferReport, TransferError> {
        let target = self.resolve().await?;
        callback.on_status(&format!("目标接收端: {}", target));

        let sink = UdpSink::bind(target).await?;
        send_transfer(&sink, request, &self.options.pacing, callback).await
    }
}

/// 简化的发送回调实现
pub struct SimpleSendCallback {
    tx: mpsc::Sender<SendEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    Status(String),
    Progress {
        kind: PayloadKind,
        sent: u64,
        total: u64,
    },
    Complete(TransferReport),
    Error(String),
}

impl SimpleSendCallback {
    pub fn new() -> (Self, mpsc::Receiver<SendEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (Self { tx }, rx)
    }
}

impl SendProgressCallback for SimpleSendCallback {
    fn on_status(&self, status: &str) {
        let _ = self.tx.try_send(SendEvent::Status(status.to_string()));
    }

    fn on_progress(&self, kind: PayloadKind, sent: u64, total: u64) {
        let _ = self.tx.try_send(SendEvent::Progress { kind, sent, total });
    }

    fn on_complete(&self, report: &TransferReport) {
        let _ = self.tx.try_send(SendEvent::Complete(report.clone()));
    }

    fn on_error(&self, error: &str) {
        let _ = self.tx.try_send(SendEvent::Error(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost() {
        let sender = Sender::new(SendOptions {
            host: "127.0.0.1".to_string(),
            port: 4000,
            ..Default::default()
        });
        let addr = sender.resolve().await.unwrap();
        assert_eq!(addr, "127.0.0.1:4000".parse().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_request_reports_error() {
        // 校验在发送流程内部完成，不会有任何数据报发出
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = Sender::new(SendOptions {
            host: "127.0.0.1".to_string(),
            port: receiver.local_addr().unwrap().port(),
            pacing: Pacing::none(),
        });
        let (callback, mut rx) = SimpleSendCallback::new();

        let result = sender.send(&TransferRequest::new(""), &callback).await;

        assert!(result.is_err());
        assert!(matches!(rx.recv().await, Some(SendEvent::Status(_))));
        assert_eq!(
            rx.recv().await,
            Some(SendEvent::Error(
                TransferError::MissingDestination.to_string()
            ))
        );
        assert!(rx.try_recv().is_err());

        let mut buf = [0u8; 64];
        let received = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            receiver.recv_from(&mut buf),
        )
        .await;
        assert!(received.is_err());
    }
}
