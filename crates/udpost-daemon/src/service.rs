//! Receiver Service - UDP 接收与通知

use anyhow::Result;
use udpost_core::{
    AppSettings, LogNotifier, Notifier, ReceiveOptions, Receiver, SaveToDirNotifier,
};

pub async fn run_service(settings: AppSettings, log_only: bool) -> Result<()> {
    tracing::info!("接收服务初始化...");

    let notifier: Box<dyn Notifier> = if log_only {
        tracing::info!("只记录日志，不保存附件");
        Box::new(LogNotifier)
    } else {
        tracing::info!("附件保存到: {:?}", settings.output_dir);
        Box::new(SaveToDirNotifier::new(&settings.output_dir))
    };

    let receiver = Receiver::bind(&ReceiveOptions::from_settings(&settings)).await?;
    tracing::info!("等待数据报...");

    receiver.serve(notifier).await;
    Ok(())
}
