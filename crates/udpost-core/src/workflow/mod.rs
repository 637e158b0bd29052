//! 工作流模块
//!
//! 提供高层 API 封装完整的发送/接收流程

pub mod receiver;
pub mod sender;

pub use receiver::{ReceiveOptions, Receiver};
pub use sender::{SendEvent, SendOptions, Sender, SimpleSendCallback};
