//! udpost Daemon
//!
//! 后台接收进程，负责：
//! - 监听 UDP 端口
//! - 按元数据声明的块数重组文件和图片
//! - 收到 EOF 后保存附件 (或只记录日志)

mod service;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use udpost_core::AppSettings;

#[derive(Parser)]
#[command(name = "udpost-daemon", version, about = "UDP 消息/文件接收端")]
struct Args {
    /// 监听地址 (默认读取配置，通常为 0.0.0.0)
    #[arg(short, long)]
    bind: Option<String>,
    /// 监听端口 (默认 4000)
    #[arg(short, long)]
    port: Option<u16>,
    /// 附件保存目录 (默认: ~/Downloads)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// 不保存附件，只记录日志
    #[arg(long)]
    log_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（udpost-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,udpost_core=debug")),
        )
        .try_init();

    let args = Args::parse();

    let mut settings = AppSettings::load();
    if let Some(bind) = args.bind {
        settings.listen_addr = bind;
    }
    if let Some(port) = args.port {
        settings.listen_port = port;
    }
    if let Some(output) = args.output {
        settings.output_dir = output;
    }

    tracing::info!("udpost Daemon starting...");

    let service_handle = tokio::spawn(service::run_service(settings, args.log_only));

    tokio::select! {
        res = service_handle => {
            tracing::error!("Receiver service exited: {:?}", res);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
