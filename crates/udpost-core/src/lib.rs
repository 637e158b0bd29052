//! udpost Core Library
//!
//! 基于 UDP 的单向消息/文件投递：发送端把可选的文本消息、文件和图片
//! 拆成 1024 字节的数据块发出，接收端按块数重组后交给通知方。
//!
//! # 模块
//!
//! - **transfer**: 数据报协议、分块发送、会话与重组
//! - **notify**: 传输完成后的通知方 (日志、保存到目录、通道)
//! - **workflow**: 发送/接收的高层封装
//! - **config**: 设置的加载与保存
//!
//! # 使用示例
//!
//! ## 发送
//!
//! ```ignore
//! use udpost_core::{Sender, SendOptions, SimpleSendCallback, TransferRequest};
//!
//! let request = TransferRequest::load("ana@example.com", Some("hola".into()), Some(path), None).await?;
//! let (callback, _events) = SimpleSendCallback::new();
//! let report = Sender::new(SendOptions::default()).send(&request, &callback).await?;
//! ```
//!
//! ## 接收
//!
//! ```ignore
//! use udpost_core::{Receiver, ReceiveOptions, SaveToDirNotifier};
//!
//! let receiver = Receiver::bind(&ReceiveOptions::default()).await?;
//! receiver.serve(SaveToDirNotifier::new("./received")).await;
//! ```

pub mod config;
pub mod notify;
pub mod transfer;
pub mod workflow;

pub use config::AppSettings;

// Notify re-exports
pub use notify::{ChannelNotifier, LogNotifier, Notifier, NotifyError, SaveToDirNotifier};

// Transfer re-exports
pub use transfer::{
    Attachment, CHUNK_SIZE, ChunkDisposition, CompletedTransfer, DatagramAction, DatagramSink,
    OutboundDatagram, Pacing, PayloadKind, Reassembler, SENTINEL, SendProgressCallback, Session,
    TransferError, TransferMetadata, TransferReport, TransferRequest, UdpSink, chunk_count,
    plan_datagrams, send_transfer,
};

// Workflow re-exports
pub use workflow::{ReceiveOptions, Receiver, SendEvent, SendOptions, Sender, SimpleSendCallback};
