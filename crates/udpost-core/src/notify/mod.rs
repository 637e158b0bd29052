//! 传输完成通知
//!
//! 接收端在收到 `EOF` 后把 [`CompletedTransfer`] 交给 [`Notifier`]。
//! 无论通知成功与否，会话都会被重置。

use log::{debug, info};

use crate::transfer::CompletedTransfer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// 通知错误
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notification channel closed")]
    ChannelClosed,
}

/// 传输完成通知方
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, transfer: &CompletedTransfer) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Box<N> {
    async fn notify(&self, transfer: &CompletedTransfer) -> Result<(), NotifyError> {
        (**self).notify(transfer).await
    }
}

/// 只记录日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, transfer: &CompletedTransfer) -> Result<(), NotifyError> {
        info!(
            "Transfer for {}: message={}, file={}, image={}",
            transfer.destination.as_deref().unwrap_or("<default>"),
            if transfer.message.is_some() { "yes" } else { "no" },
            describe(transfer.has_real_file(), &transfer.file_name, transfer.file.len()),
            describe(transfer.has_real_image(), &transfer.image_name, transfer.image.len()),
        );
        Ok(())
    }
}

fn describe(present: bool, name: &str, len: usize) -> String {
    if present {
        format!("{} ({} bytes)", name, len)
    } else {
        "none".to_string()
    }
}

/// 把附件保存到目录
///
/// 每次传输一个子目录 (随机 UUID)，包含收到的文件、图片，
/// 以及有消息时的 `message.txt`。有目标邮箱时最后写出 `destination.txt`。
#[derive(Debug, Clone)]
pub struct SaveToDirNotifier {
    output_dir: PathBuf,
}

impl SaveToDirNotifier {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 保存并返回本次传输的目录
    pub async fn save(&self, transfer: &CompletedTransfer) -> Result<PathBuf, NotifyError> {
        let dir = self.output_dir.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;

        if let Some(message) = &transfer.message {
            tokio::fs::write(dir.join("message.txt"), message).await?;
        }
        if transfer.has_real_file() {
            let path = dir.join(safe_file_name(&transfer.file_name, "file"));
            tokio::fs::write(&path, &transfer.file).await?;
            debug!("Saved {:?}", path);
        }
        if transfer.has_real_image() {
            let path = dir.join(safe_file_name(&transfer.image_name, "image"));
            tokio::fs::write(&path, &transfer.image).await?;
            debug!("Saved {:?}", path);
        }
        // 最后写出，出现即表示目录已完整
        if let Some(destination) = &transfer.destination {
            tokio::fs::write(dir.join("destination.txt"), destination).await?;
        }

        Ok(dir)
    }
}

#[async_trait]
impl Notifier for SaveToDirNotifier {
    async fn notify(&self, transfer: &CompletedTransfer) -> Result<(), NotifyError> {
        let dir = self.save(transfer).await?;
        info!(
            "Transfer for {} saved to {:?}",
            transfer.destination.as_deref().unwrap_or("<default>"),
            dir
        );
        Ok(())
    }
}

/// 只保留最后一段路径，避免写出目标目录
fn safe_file_name(name: &str, fallback: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match last {
        "" | "." | ".." => fallback.to_string(),
        _ => last.to_string(),
    }
}

/// 把完成的传输转发到通道
pub struct ChannelNotifier {
    tx: mpsc::Sender<CompletedTransfer>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CompletedTransfer>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, transfer: &CompletedTransfer) -> Result<(), NotifyError> {
        self.tx
            .send(transfer.clone())
            .await
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> CompletedTransfer {
        CompletedTransfer {
            destination: Some("a@b.c".to_string()),
            file_name: "../../etc/notes.txt".to_string(),
            image_name: "cat.png".to_string(),
            message: Some("hola".to_string()),
            has_file: true,
            has_image: false,
            file: b"contents".to_vec(),
            image: Vec::new(),
            peer: None,
        }
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("a/b/c.txt", "file"), "c.txt");
        assert_eq!(safe_file_name("C:\\x\\y.png", "image"), "y.png");
        assert_eq!(safe_file_name("..", "file"), "file");
        assert_eq!(safe_file_name("dir/", "file"), "file");
    }

    #[tokio::test]
    async fn test_save_to_dir() {
        let root = std::env::temp_dir().join(format!("udpost-test-{}", uuid::Uuid::new_v4()));
        let notifier = SaveToDirNotifier::new(&root);

        let dir = notifier.save(&transfer()).await.unwrap();

        assert!(dir.starts_with(&root));
        assert_eq!(
            tokio::fs::read(dir.join("notes.txt")).await.unwrap(),
            b"contents"
        );
        assert_eq!(
            tokio::fs::read_to_string(dir.join("message.txt")).await.unwrap(),
            "hola"
        );
        // 未声明图片，不写出
        assert!(!dir.join("cat.png").exists());
        assert_eq!(
            tokio::fs::read_to_string(dir.join("destination.txt")).await.unwrap(),
            "a@b.c"
        );

        // 没有目标邮箱时不写 destination.txt
        let anonymous = CompletedTransfer {
            destination: None,
            ..transfer()
        };
        let dir = notifier.save(&anonymous).await.unwrap();
        assert!(dir.join("message.txt").exists());
        assert!(!dir.join("destination.txt").exists());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_notifier() {
        let (notifier, mut rx) = ChannelNotifier::new(1);
        notifier.notify(&transfer()).await.unwrap();
        assert_eq!(rx.recv().await, Some(transfer()));

        drop(rx);
        assert!(matches!(
            notifier.notify(&transfer()).await,
            Err(NotifyError::ChannelClosed)
        ));
    }
}
