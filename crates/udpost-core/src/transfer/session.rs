//! 接收端会话
//!
//! 同一时间只支持一个进行中的传输。数据块没有序号，
//! 按到达计数归属: 前 `file_chunks` 个归文件，随后 `image_chunks` 个归图片，
//! 其余丢弃。前提是数据报按发送顺序到达。

use crate::transfer::protocol::TransferMetadata;
use std::net::SocketAddr;

/// 未声明文件名时使用的名称
pub const DEFAULT_FILE_NAME: &str = "received_file.txt";

/// 未声明图片名时使用的名称
pub const DEFAULT_IMAGE_NAME: &str = "received_image";

/// 数据块的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// 追加到文件 (`index` 从 1 开始)
    File { index: u64, expected: u64 },
    /// 追加到图片 (`index` 从 1 开始)
    Image { index: u64, expected: u64 },
    /// 元数据未声明任何附件，按旧版单文件模式追加到文件
    Legacy,
    /// 超出声明的块数，已丢弃
    Unassigned,
}

/// 接收端会话状态
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Session {
    metadata: TransferMetadata,
    peer: Option<SocketAddr>,
    file_buffer: Vec<u8>,
    image_buffer: Vec<u8>,
    received_chunks: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已设置目标邮箱或已累积文件数据
    pub fn is_active(&self) -> bool {
        !self.metadata.email.is_empty() || !self.file_buffer.is_empty()
    }

    /// 以收到的元数据开始新会话
    pub fn begin_session(&mut self, metadata: TransferMetadata, peer: SocketAddr) {
        self.metadata = metadata;
        self.peer = Some(peer);
        self.file_buffer.clear();
        self.image_buffer.clear();
        self.received_chunks = 0;
    }

    /// 追加一个数据块
    pub fn append_chunk(&mut self, data: &[u8]) -> ChunkDisposition {
        let meta = &self.metadata;

        if !meta.has_file && !meta.has_image {
            self.file_buffer.extend_from_slice(data);
            return ChunkDisposition::Legacy;
        }

        self.received_chunks = self.received_chunks.saturating_add(1);
        let n = self.received_chunks;

        if meta.has_file && n <= meta.file_chunks {
            self.file_buffer.extend_from_slice(data);
            ChunkDisposition::File {
                index: n,
                expected: meta.file_chunks,
            }
        } else if meta.has_image && n <= meta.total_chunks() {
            self.image_buffer.extend_from_slice(data);
            ChunkDisposition::Image {
                index: n.saturating_sub(meta.file_chunks),
                expected: meta.image_chunks,
            }
        } else {
            ChunkDisposition::Unassigned
        }
    }

    /// 结束会话，取出累积的数据并重置为初始状态
    pub fn finalize(&mut self) -> CompletedTransfer {
        let Session {
            metadata,
            peer,
            file_buffer,
            image_buffer,
            ..
        } = std::mem::take(self);

        CompletedTransfer {
            destination: Some(metadata.email).filter(|e| !e.is_empty()),
            file_name: metadata
                .file_name
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            image_name: metadata
                .image_name
                .unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
            message: metadata.message,
            has_file: metadata.has_file,
            has_image: metadata.has_image,
            file: file_buffer,
            image: image_buffer,
            peer,
        }
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// 开启会话的对端地址
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn file_buffer(&self) -> &[u8] {
        &self.file_buffer
    }

    pub fn image_buffer(&self) -> &[u8] {
        &self.image_buffer
    }

    /// 已计数的数据块 (旧版模式下不计数)
    pub fn received_chunks(&self) -> u64 {
        self.received_chunks
    }
}

/// 已结束的传输，交给通知方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub destination: Option<String>,
    pub file_name: String,
    pub image_name: String,
    pub message: Option<String>,
    pub has_file: bool,
    pub has_image: bool,
    pub file: Vec<u8>,
    pub image: Vec<u8>,
    pub peer: Option<SocketAddr>,
}

impl CompletedTransfer {
    /// 声明了文件且确实收到了数据
    pub fn has_real_file(&self) -> bool {
        self.has_file && !self.file.is_empty()
    }

    pub fn has_real_image(&self) -> bool {
        self.has_image && !self.image.is_empty()
    }

    /// 没有消息也没有可用附件
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && !self.has_real_file() && !self.has_real_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn meta(file_chunks: u64, image_chunks: u64) -> TransferMetadata {
        TransferMetadata {
            email: "a@b.c".to_string(),
            has_file: file_chunks > 0,
            has_image: image_chunks > 0,
            file_name: (file_chunks > 0).then(|| "doc.txt".to_string()),
            file_chunks,
            image_name: (image_chunks > 0).then(|| "pic.png".to_string()),
            image_chunks,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_session_is_inactive() {
        let session = Session::new();
        assert!(!session.is_active());
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_file_then_image_by_count() {
        let mut session = Session::new();
        session.begin_session(meta(2, 1), peer());
        assert!(session.is_active());

        assert_eq!(
            session.append_chunk(&[1; 1024]),
            ChunkDisposition::File {
                index: 1,
                expected: 2
            }
        );
        assert_eq!(
            session.append_chunk(&[2; 10]),
            ChunkDisposition::File {
                index: 2,
                expected: 2
            }
        );
        assert_eq!(
            session.append_chunk(&[3; 7]),
            ChunkDisposition::Image {
                index: 1,
                expected: 1
            }
        );

        assert_eq!(session.file_buffer().len(), 1034);
        assert_eq!(session.image_buffer(), &[3; 7]);
        assert_eq!(session.received_chunks(), 3);
    }

    #[test]
    fn test_extra_chunk_unassigned() {
        let mut session = Session::new();
        session.begin_session(meta(2, 2), peer());

        for _ in 0..4 {
            session.append_chunk(&[0; 100]);
        }
        assert_eq!(session.append_chunk(&[9; 100]), ChunkDisposition::Unassigned);

        assert_eq!(session.file_buffer().len(), 200);
        assert_eq!(session.image_buffer().len(), 200);
    }

    #[test]
    fn test_image_only() {
        let mut session = Session::new();
        session.begin_session(meta(0, 1), peer());

        assert_eq!(
            session.append_chunk(b"png"),
            ChunkDisposition::Image {
                index: 1,
                expected: 1
            }
        );
        assert!(session.file_buffer().is_empty());
    }

    #[test]
    fn test_zero_counts_with_flags_are_unassigned() {
        let mut session = Session::new();
        let mut broken = meta(0, 0);
        broken.has_file = true;
        session.begin_session(broken, peer());

        assert_eq!(session.append_chunk(b"data"), ChunkDisposition::Unassigned);
        assert!(session.file_buffer().is_empty());
    }

    #[test]
    fn test_image_flag_with_stale_file_count() {
        // hasFile=false 但 fileChunks 仍为 2：按计数归入图片，序号不下溢
        let broken = TransferMetadata::parse(
            br#"{"email":"a@b.c","hasFile":false,"hasImage":true,"fileChunks":2,"imageChunks":1}"#,
        )
        .unwrap();
        let mut session = Session::new();
        session.begin_session(broken, peer());

        assert_eq!(
            session.append_chunk(b"x"),
            ChunkDisposition::Image {
                index: 0,
                expected: 1
            }
        );
        assert_eq!(session.image_buffer(), b"x");
    }

    #[test]
    fn test_huge_chunk_counts_do_not_overflow() {
        let mut huge = meta(1, 1);
        huge.file_chunks = u64::MAX;
        let mut session = Session::new();
        session.begin_session(huge, peer());

        assert_eq!(
            session.append_chunk(b"x"),
            ChunkDisposition::File {
                index: 1,
                expected: u64::MAX
            }
        );

        let mut both_huge = meta(1, 1);
        both_huge.file_chunks = u64::MAX;
        both_huge.image_chunks = u64::MAX;
        session.begin_session(both_huge, peer());
        assert!(matches!(
            session.append_chunk(b"y"),
            ChunkDisposition::File { index: 1, .. }
        ));
    }

    #[test]
    fn test_legacy_mode_appends_everything() {
        let mut session = Session::new();
        assert_eq!(session.append_chunk(b"abc"), ChunkDisposition::Legacy);
        assert_eq!(session.append_chunk(b"def"), ChunkDisposition::Legacy);

        assert!(session.is_active());
        assert_eq!(session.file_buffer(), b"abcdef");
        assert_eq!(session.received_chunks(), 0);
    }

    #[test]
    fn test_finalize_resets() {
        let mut session = Session::new();
        session.begin_session(meta(1, 1), peer());
        session.append_chunk(b"file");
        session.append_chunk(b"image");

        let done = session.finalize();
        assert_eq!(done.destination.as_deref(), Some("a@b.c"));
        assert_eq!(done.file, b"file");
        assert_eq!(done.image, b"image");
        assert_eq!(done.peer, Some(peer()));
        assert!(done.has_real_file());
        assert!(done.has_real_image());

        assert_eq!(session, Session::default());
        // 再次结束仍是初始状态
        let again = session.finalize();
        assert!(again.is_empty());
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_finalize_default_names() {
        let mut session = Session::new();
        session.append_chunk(b"legacy");

        let done = session.finalize();
        assert_eq!(done.destination, None);
        assert_eq!(done.file_name, DEFAULT_FILE_NAME);
        assert_eq!(done.image_name, DEFAULT_IMAGE_NAME);
        // 旧版模式没有声明 hasFile
        assert!(!done.has_real_file());
    }
}
