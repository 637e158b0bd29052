//! 发送端
//!
//! 把一次传输展开为确定的数据报序列并按固定节奏发出:
//!
//! ```text
//! 元数据 -> 文件块 x N -> 图片块 x M -> EOF
//! ```
//!
//! # 可靠性
//!
//! UDP 没有流量控制，也没有确认。每个数据报之间插入短暂停顿以降低丢包，
//! 单个数据报发送失败只记录日志，不重试，也不中断后续发送。

use log::{debug, info, warn};

use crate::transfer::TransferError;
use crate::transfer::protocol::{CHUNK_SIZE, SENTINEL, TransferMetadata, chunk_count};
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::UdpSocket;

/// 附件 (文件或图片)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// 发送给接收端的文件名 (不含路径)
    pub name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// 从本地路径读取附件
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TransferError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        debug!(
            "Loaded {:?} as {} ({} bytes, {} chunks)",
            path,
            name,
            data.len(),
            chunk_count(data.len())
        );

        Ok(Self { name, data })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn chunk_count(&self) -> u64 {
        chunk_count(self.data.len())
    }
}

/// 发送请求
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    /// 目标邮箱
    pub email: String,
    pub message: Option<String>,
    pub file: Option<Attachment>,
    pub image: Option<Attachment>,
}

impl TransferRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_file(mut self, file: Attachment) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_image(mut self, image: Attachment) -> Self {
        self.image = Some(image);
        self
    }

    /// 从本地路径构建请求
    pub async fn load(
        email: impl Into<String>,
        message: Option<String>,
        file: Option<&Path>,
        image: Option<&Path>,
    ) -> Result<Self, TransferError> {
        let mut request = Self::new(email);
        request.message = message;
        if let Some(path) = file {
            request.file = Some(Attachment::from_path(path).await?);
        }
        if let Some(path) = image {
            request.image = Some(Attachment::from_path(path).await?);
        }
        Ok(request)
    }

    /// 非空消息 (只有空白的消息视为没有消息)
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }

    /// 实际要发送的文件 (空文件视为没有文件)
    pub fn file(&self) -> Option<&Attachment> {
        self.file.as_ref().filter(|a| !a.data.is_empty())
    }

    pub fn image(&self) -> Option<&Attachment> {
        self.image.as_ref().filter(|a| !a.data.is_empty())
    }

    /// 校验: 必须有目标邮箱，且至少有消息、文件或图片之一
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.email.trim().is_empty() {
            return Err(TransferError::MissingDestination);
        }
        if self.message().is_none() && self.file().is_none() && self.image().is_none() {
            return Err(TransferError::EmptyTransfer);
        }
        Ok(())
    }

    /// 构建元数据，缺失的附件大小与块数为 0
    pub fn metadata(&self) -> TransferMetadata {
        let file = self.file();
        let image = self.image();

        TransferMetadata {
            email: self.email.trim().to_string(),
            message: self.message().map(str::to_string),
            has_file: file.is_some(),
            has_image: image.is_some(),
            file_name: file.map(|a| a.name.clone()),
            file_size: file.map_or(0, Attachment::size),
            file_chunks: file.map_or(0, Attachment::chunk_count),
            image_name: image.map(|a| a.name.clone()),
            image_size: image.map_or(0, Attachment::size),
            image_chunks: image.map_or(0, Attachment::chunk_count),
        }
    }
}

/// 数据块所属的附件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    File,
    Image,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::File => write!(f, "file"),
            PayloadKind::Image => write!(f, "image"),
        }
    }
}

/// 待发送的数据报
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundDatagram<'a> {
    Metadata(Vec<u8>),
    /// `number` 从 1 开始
    Chunk {
        kind: PayloadKind,
        number: u64,
        total: u64,
        data: &'a [u8],
    },
    Sentinel,
}

impl OutboundDatagram<'_> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            OutboundDatagram::Metadata(bytes) => bytes,
            OutboundDatagram::Chunk { data, .. } => data,
            OutboundDatagram::Sentinel => SENTINEL,
        }
    }
}

impl fmt::Display for OutboundDatagram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundDatagram::Metadata(_) => write!(f, "metadata"),
            OutboundDatagram::Chunk {
                kind,
                number,
                total,
                ..
            } => write!(f, "{} chunk {}/{}", kind, number, total),
            OutboundDatagram::Sentinel => write!(f, "EOF"),
        }
    }
}

/// 展开一次传输的数据报序列
pub fn plan_datagrams(request: &TransferRequest) -> Result<Vec<OutboundDatagram<'_>>, TransferError> {
    let metadata = request.metadata();
    let mut plan = Vec::with_capacity(metadata.total_chunks() as usize + 2);

    plan.push(OutboundDatagram::Metadata(metadata.to_bytes()?));

    for (kind, attachment) in [
        (PayloadKind::File, request.file()),
        (PayloadKind::Image, request.image()),
    ] {
        let Some(attachment) = attachment else {
            continue;
        };
        let total = attachment.chunk_count();
        for (i, data) in attachment.data.chunks(CHUNK_SIZE).enumerate() {
            plan.push(OutboundDatagram::Chunk {
                kind,
                number: i as u64 + 1,
                total,
                data,
            });
        }
    }

    plan.push(OutboundDatagram::Sentinel);
    Ok(plan)
}

/// 发送节奏
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// 元数据之后的停顿
    pub after_metadata: Duration,
    /// 每个数据块之后的停顿
    pub between_chunks: Duration,
    /// 发送 EOF 之前的停顿
    pub before_sentinel: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_metadata: Duration::from_millis(20),
            between_chunks: Duration::from_millis(5),
            before_sentinel: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    /// 不停顿 (用于回环测试)
    pub fn none() -> Self {
        Self {
            after_metadata: Duration::ZERO,
            between_chunks: Duration::ZERO,
            before_sentinel: Duration::ZERO,
        }
    }
}

/// 数据报出口
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// 发送单个数据报，返回写出的字节数
    async fn send_datagram(&self, data: &[u8]) -> io::Result<usize>;
}

/// UDP 出口
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    pub fn new(socket: UdpSocket, target: SocketAddr) -> Self {
        Self { socket, target }
    }

    /// 绑定与目标地址族相同的临时端口
    pub async fn bind(target: SocketAddr) -> io::Result<Self> {
        let local = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("Sender socket bound to {}", socket.local_addr()?);
        Ok(Self::new(socket, target))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl DatagramSink for UdpSink {
    async fn send_datagram(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, self.target).await
    }
}

/// 发送进度回调
pub trait SendProgressCallback: Send + Sync {
    /// 状态更新
    fn on_status(&self, status: &str);
    /// 进度更新 (已发送块数 / 总块数)
    fn on_progress(&self, kind: PayloadKind, sent: u64, total: u64);
    /// 发送完成
    fn on_complete(&self, report: &TransferReport);
    /// 发送失败
    fn on_error(&self, error: &str);
}

/// 发送结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// 成功交给套接字的数据报
    pub sent: u64,
    /// 发送失败的数据报
    pub failed: u64,
    pub file_chunks: u64,
    pub image_chunks: u64,
}

impl TransferReport {
    /// 所有数据报都已交给套接字 (不代表对端收到)
    pub fn all_sent(&self) -> bool {
        self.failed == 0
    }
}

/// 四舍五入的百分比
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// 按节奏发送一次传输
///
/// 只有本地错误 (校验、元数据序列化) 会返回 `Err`；
/// 数据报级别的失败计入 [`TransferReport::failed`]。
pub async fn send_transfer<S, C>(
    sink: &S,
    request: &TransferRequest,
    pacing: &Pacing,
    callback: &C,
) -> Result<TransferReport, TransferError>
where
    S: DatagramSink + ?Sized,
    C: SendProgressCallback + ?Sized,
{
    request.validate()?;
    let plan = plan_datagrams(request)?;
    let metadata = request.metadata();

    let mut report = TransferReport {
        file_chunks: metadata.file_chunks,
        image_chunks: metadata.image_chunks,
        ..Default::default()
    };

    for datagram in &plan {
        match datagram {
            OutboundDatagram::Metadata(_) => {
                callback.on_status("发送元数据...");
            }
            OutboundDatagram::Chunk {
                kind,
                number: 1,
                total,
                ..
            } => {
                let size = match kind {
                    PayloadKind::File => metadata.file_size,
                    PayloadKind::Image => metadata.image_size,
                };
                callback.on_status(&format!(
                    "发送{} ({} 字节, {} 个数据包)",
                    if *kind == PayloadKind::File { "文件" } else { "图片" },
                    size,
                    total
                ));
            }
            OutboundDatagram::Sentinel => {
                tokio::time::sleep(pacing.before_sentinel).await;
            }
            OutboundDatagram::Chunk { .. } => {}
        }

        match sink.send_datagram(datagram.bytes()).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                warn!("Failed to send {}: {}", datagram, e);
                report.failed += 1;
            }
        }

        match datagram {
            OutboundDatagram::Metadata(_) => {
                tokio::time::sleep(pacing.after_metadata).await;
                if metadata.total_chunks() == 0 {
                    info!("No attachments, sending message only");
                }
            }
            OutboundDatagram::Chunk {
                kind,
                number,
                total,
                ..
            } => {
                callback.on_progress(*kind, *number, *total);
                tokio::time::sleep(pacing.between_chunks).await;
            }
            OutboundDatagram::Sentinel => {
                info!(
                    "Transfer to {} finished: {} sent, {} failed",
                    metadata.email, report.sent, report.failed
                );
            }
        }
    }

    callback.on_complete(&report);
    Ok(report)
}
