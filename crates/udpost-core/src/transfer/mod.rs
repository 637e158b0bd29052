//! UDP 传输模块
//!
//! 包含:
//! - 数据报协议 (元数据 JSON / 原始数据块 / `EOF` 结束标记)
//! - 发送端分块与节流发送
//! - 接收端会话状态与重组

pub mod outbound;
pub mod protocol;
pub mod reassembler;
pub mod session;

pub use outbound::{
    Attachment, DatagramSink, OutboundDatagram, Pacing, PayloadKind, SendProgressCallback,
    TransferReport, TransferRequest, UdpSink, plan_datagrams, send_transfer,
};
pub use protocol::{CHUNK_SIZE, SENTINEL, TransferMetadata, chunk_count};
pub use reassembler::{DatagramAction, Reassembler};
pub use session::{ChunkDisposition, CompletedTransfer, Session};

use std::path::PathBuf;

/// 传输错误
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// 本地读取或套接字错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// 未指定目标邮箱
    #[error("No destination address given")]
    MissingDestination,

    /// 既没有消息也没有附件
    #[error("Nothing to send: provide a message, a file or an image")]
    EmptyTransfer,

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// 无法解析接收端地址
    #[error("Cannot resolve receiver address: {0}")]
    Resolve(String),
}
