//! 接收端重组器
//!
//! 逐个处理到达的数据报，每个数据报处理完才读取下一个，会话状态只有一个所有者。
//!
//! | 数据报                     | 处理                              |
//! |----------------------------|-----------------------------------|
//! | `EOF`                      | 结束会话，通知，重置              |
//! | 无会话时可解析的元数据     | 开始会话                          |
//! | 其它 (含解析失败的元数据)  | 作为数据块交给 [`Session`]        |
//!
//! 若第二个发送端在第一个传输结束前开始发送，两者的数据会混在一起。
//! 这里只记录警告，不按来源地址区分会话。

use log::{debug, error, info, warn};

use crate::notify::Notifier;
use crate::transfer::protocol::{TransferMetadata, is_sentinel};
use crate::transfer::session::{ChunkDisposition, Session};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// 接收缓冲区大小 (足以容纳任意 UDP 数据报)
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// 单个数据报的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramAction {
    SessionStarted,
    Payload(ChunkDisposition),
    /// 会话已结束并重置，`notified` 表示通知是否成功
    Finalized { notified: bool },
}

/// 数据报重组器
pub struct Reassembler<N> {
    session: Session,
    notifier: N,
}

impl<N: Notifier> Reassembler<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            session: Session::new(),
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// 处理一个数据报
    pub async fn handle_datagram(&mut self, data: &[u8], peer: SocketAddr) -> DatagramAction {
        if is_sentinel(data) {
            return self.finish(peer).await;
        }

        if !self.session.is_active() {
            match TransferMetadata::parse(data) {
                Ok(metadata) => {
                    info!(
                        "Metadata from {}: email={}, file={:?}, image={:?}, chunks={}+{}, message={}",
                        peer,
                        metadata.email,
                        metadata.file_name,
                        metadata.image_name,
                        metadata.file_chunks,
                        metadata.image_chunks,
                        if metadata.message.is_some() { "yes" } else { "no" }
                    );
                    self.session.begin_session(metadata, peer);
                    return DatagramAction::SessionStarted;
                }
                Err(e) => {
                    warn!(
                        "Datagram from {} is not metadata ({}), treating it as a file chunk",
                        peer, e
                    );
                }
            }
        } else if let Some(owner) = self.session.peer()
            && owner != peer
        {
            warn!(
                "Datagram from {} while a transfer from {} is in progress, data may be mixed",
                peer, owner
            );
        }

        let disposition = self.session.append_chunk(data);
        match disposition {
            ChunkDisposition::File { index, expected } => {
                debug!("File chunk {}/{} ({} bytes)", index, expected, data.len());
            }
            ChunkDisposition::Image { index, expected } => {
                debug!("Image chunk {}/{} ({} bytes)", index, expected, data.len());
            }
            ChunkDisposition::Legacy => {
                debug!("Chunk of {} bytes", data.len());
            }
            ChunkDisposition::Unassigned => {
                warn!("Extra chunk of {} bytes from {} (unassigned)", data.len(), peer);
            }
        }
        DatagramAction::Payload(disposition)
    }

    async fn finish(&mut self, peer: SocketAddr) -> DatagramAction {
        let transfer = self.session.finalize();
        info!(
            "End of transmission from {}, notifying {}",
            peer,
            transfer.destination.as_deref().unwrap_or("<default>")
        );

        match self.notifier.notify(&transfer).await {
            Ok(()) => DatagramAction::Finalized { notified: true },
            Err(e) => {
                error!("Failed to deliver transfer: {}", e);
                DatagramAction::Finalized { notified: false }
            }
        }
    }

    /// 持续从套接字读取并处理数据报
    ///
    /// 接收错误只记录日志，循环不会退出。
    pub async fn run(&mut self, socket: &UdpSocket) {
        let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, peer)) => {
                    self.handle_datagram(&buffer[..len], peer).await;
                }
                Err(e) => {
                    error!("Receive error: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelNotifier, NotifyError};
    use crate::transfer::outbound::{Attachment, TransferRequest, plan_datagrams};
    use crate::transfer::protocol::SENTINEL;
    use crate::transfer::session::CompletedTransfer;
    use async_trait::async_trait;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _transfer: &CompletedTransfer) -> Result<(), NotifyError> {
            Err(NotifyError::Io(std::io::Error::other("smtp down")))
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn bytes(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    async fn deliver<N: Notifier>(reassembler: &mut Reassembler<N>, request: &TransferRequest) {
        for datagram in plan_datagrams(request).unwrap() {
            reassembler.handle_datagram(datagram.bytes(), peer()).await;
        }
    }

    #[tokio::test]
    async fn test_ordered_delivery_reassembles() {
        let file = bytes(2500, 1);
        let image = bytes(3000, 7);
        let request = TransferRequest::new("a@b.c")
            .with_message("hola")
            .with_file(Attachment::new("doc.bin", file.clone()))
            .with_image(Attachment::new("pic.png", image.clone()));

        let (notifier, mut rx) = ChannelNotifier::new(4);
        let mut reassembler = Reassembler::new(notifier);
        deliver(&mut reassembler, &request).await;

        let done = rx.recv().await.unwrap();
        assert_eq!(done.file, file);
        assert_eq!(done.image, image);
        assert_eq!(done.file_name, "doc.bin");
        assert_eq!(done.image_name, "pic.png");
        assert_eq!(done.message.as_deref(), Some("hola"));
        assert_eq!(*reassembler.session(), Session::default());
    }

    #[tokio::test]
    async fn test_message_only() {
        let request = TransferRequest::new("a@b.c").with_message("solo texto");
        let (notifier, mut rx) = ChannelNotifier::new(1);
        let mut reassembler = Reassembler::new(notifier);

        let plan = plan_datagrams(&request).unwrap();
        assert_eq!(
            reassembler.handle_datagram(plan[0].bytes(), peer()).await,
            DatagramAction::SessionStarted
        );
        assert_eq!(
            reassembler.handle_datagram(SENTINEL, peer()).await,
            DatagramAction::Finalized { notified: true }
        );

        let done = rx.recv().await.unwrap();
        assert_eq!(done.message.as_deref(), Some("solo texto"));
        assert!(!done.has_real_file());
        assert!(!done.has_real_image());
    }

    #[tokio::test]
    async fn test_unassigned_extra_chunk() {
        let request = TransferRequest::new("a@b.c")
            .with_file(Attachment::new("a", bytes(2048, 0)))
            .with_image(Attachment::new("b", bytes(2048, 0)));
        let plan = plan_datagrams(&request).unwrap();

        let (notifier, mut rx) = ChannelNotifier::new(1);
        let mut reassembler = Reassembler::new(notifier);
        for datagram in &plan[..plan.len() - 1] {
            reassembler.handle_datagram(datagram.bytes(), peer()).await;
        }

        assert_eq!(
            reassembler.handle_datagram(b"stray", peer()).await,
            DatagramAction::Payload(ChunkDisposition::Unassigned)
        );
        assert_eq!(reassembler.session().file_buffer().len(), 2048);
        assert_eq!(reassembler.session().image_buffer().len(), 2048);

        reassembler.handle_datagram(SENTINEL, peer()).await;
        let done = rx.recv().await.unwrap();
        assert_eq!(done.file.len(), 2048);
        assert_eq!(done.image.len(), 2048);
    }

    #[tokio::test]
    async fn test_non_json_without_session_is_payload() {
        let (notifier, _rx) = ChannelNotifier::new(1);
        let mut reassembler = Reassembler::new(notifier);

        assert_eq!(
            reassembler.handle_datagram(b"plain text", peer()).await,
            DatagramAction::Payload(ChunkDisposition::Legacy)
        );
        assert_eq!(reassembler.session().file_buffer(), b"plain text");

        // 会话已激活，后续的 JSON 不再当作元数据
        let meta = TransferRequest::new("x@y.z").with_message("m").metadata();
        assert_eq!(
            reassembler
                .handle_datagram(&meta.to_bytes().unwrap(), peer())
                .await,
            DatagramAction::Payload(ChunkDisposition::Legacy)
        );
    }

    #[tokio::test]
    async fn test_notifier_failure_still_resets() {
        let mut reassembler = Reassembler::new(FailingNotifier);
        let request = TransferRequest::new("a@b.c").with_file(Attachment::new("a", bytes(10, 0)));
        let plan = plan_datagrams(&request).unwrap();

        reassembler.handle_datagram(plan[0].bytes(), peer()).await;
        reassembler.handle_datagram(plan[1].bytes(), peer()).await;
        assert!(reassembler.session().is_active());

        assert_eq!(
            reassembler.handle_datagram(SENTINEL, peer()).await,
            DatagramAction::Finalized { notified: false }
        );
        assert_eq!(*reassembler.session(), Session::default());

        // 可以立即接收下一个传输
        assert_eq!(
            reassembler.handle_datagram(plan[0].bytes(), peer()).await,
            DatagramAction::SessionStarted
        );
    }

    #[tokio::test]
    async fn test_back_to_back_transfers() {
        let first = TransferRequest::new("a@b.c").with_file(Attachment::new("1", bytes(1500, 3)));
        let second =
            TransferRequest::new("d@e.f").with_image(Attachment::new("2.png", bytes(900, 5)));

        let (notifier, mut rx) = ChannelNotifier::new(2);
        let mut reassembler = Reassembler::new(notifier);
        deliver(&mut reassembler, &first).await;
        deliver(&mut reassembler, &second).await;

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(a.destination.as_deref(), Some("a@b.c"));
        assert_eq!(a.file, bytes(1500, 3));
        assert_eq!(b.destination.as_deref(), Some("d@e.f"));
        assert_eq!(b.image, bytes(900, 5));
        assert!(b.file.is_empty());
    }
}
