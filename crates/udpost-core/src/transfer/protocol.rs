//! 数据报协议
//!
//! 一次传输按顺序由三类数据报组成:
//! 1. 元数据: UTF-8 JSON 对象 (见 [`TransferMetadata`])
//! 2. 数据块: 无头部的原始字节，每块最多 [`CHUNK_SIZE`] 字节，先文件后图片
//! 3. 结束标记: 字面量 `EOF`
//!
//! 数据块没有序号，接收端依赖到达顺序与元数据中声明的块数进行归属。

use serde::{Deserialize, Serialize};

/// 单个数据块的最大字节数
pub const CHUNK_SIZE: usize = 1024;

/// 结束标记
pub const SENTINEL: &[u8] = b"EOF";

/// 接收端默认端口
pub const DEFAULT_PORT: u16 = 4000;

/// 发送端默认目标主机
pub const DEFAULT_HOST: &str = "localhost";

/// 计算 `len` 字节需要的数据块数量 (向上取整)
pub fn chunk_count(len: usize) -> u64 {
    len.div_ceil(CHUNK_SIZE) as u64
}

/// 是否为结束标记
pub fn is_sentinel(data: &[u8]) -> bool {
    data == SENTINEL
}

/// 传输元数据
///
/// 每次传输的第一个数据报。线上格式兼容旧版发送端:
/// 文件名可为 `filename` 或 `fileName`，文件块数可为 `chunks` 或 `fileChunks`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMetadata", into = "WireMetadata")]
pub struct TransferMetadata {
    /// 目标邮箱
    pub email: String,
    pub message: Option<String>,
    pub has_file: bool,
    pub has_image: bool,
    pub file_name: Option<String>,
    pub file_size: u64,
    pub file_chunks: u64,
    pub image_name: Option<String>,
    pub image_size: u64,
    pub image_chunks: u64,
}

impl TransferMetadata {
    /// 从数据报解析元数据
    ///
    /// 必须是包含 `email` 字段的 JSON 对象，否则返回错误，
    /// 调用方据此把数据报当作数据块处理。
    pub fn parse(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// 序列化为数据报
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// 声明的数据块总数
    pub fn total_chunks(&self) -> u64 {
        self.file_chunks.saturating_add(self.image_chunks)
    }
}

/// 线上 JSON 结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    email: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    has_file: bool,
    #[serde(default)]
    has_image: bool,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    chunks: u64,
    #[serde(default)]
    file_chunks: u64,
    #[serde(default)]
    image_filename: Option<String>,
    #[serde(default)]
    image_size: u64,
    #[serde(default)]
    image_chunks: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl From<WireMetadata> for TransferMetadata {
    fn from(wire: WireMetadata) -> Self {
        let file_chunks = if wire.file_chunks != 0 {
            wire.file_chunks
        } else {
            wire.chunks
        };

        Self {
            email: wire.email,
            message: non_empty(wire.message),
            has_file: wire.has_file,
            has_image: wire.has_image,
            file_name: non_empty(wire.file_name).or_else(|| non_empty(wire.filename)),
            file_size: wire.size,
            file_chunks,
            image_name: non_empty(wire.image_filename),
            image_size: wire.image_size,
            image_chunks: wire.image_chunks,
        }
    }
}

impl From<TransferMetadata> for WireMetadata {
    fn from(meta: TransferMetadata) -> Self {
        Self {
            email: meta.email,
            message: meta.message,
            has_file: meta.has_file,
            has_image: meta.has_image,
            filename: meta.file_name,
            file_name: None,
            size: meta.file_size,
            chunks: meta.file_chunks,
            file_chunks: meta.file_chunks,
            image_filename: meta.image_name,
            image_size: meta.image_size,
            image_chunks: meta.image_chunks,
        }
    }
}
