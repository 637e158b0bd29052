//! udpost CLI
//!
//! 命令行发送端，把消息、文件和图片通过 UDP 发送给接收端

mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use udpost_core::{AppSettings, CHUNK_SIZE, SendOptions, Sender, TransferRequest};

use progress::ConsoleProgress;

#[derive(Parser)]
#[command(name = "udpost", version, about = "UDP 消息/文件发送工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 发送消息和附件
    Send {
        /// 目标邮箱
        #[arg(short, long)]
        to: String,
        /// 文本消息
        #[arg(short, long)]
        message: Option<String>,
        /// 要发送的文件
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// 要发送的图片
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// 接收端主机 (默认: localhost)
        #[arg(long)]
        host: Option<String>,
        /// 接收端端口 (默认: 4000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// 查看当前配置
    Config {
        /// 把当前配置写入配置文件
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（udpost-core 使用）到 tracing，默认只显示警告
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let settings = AppSettings::load();

    match cli.command {
        Commands::Send {
            to,
            message,
            file,
            image,
            host,
            port,
        } => {
            let request =
                TransferRequest::load(to, message, file.as_deref(), image.as_deref()).await?;
            request.validate()?;
            print_summary(&request);

            let mut options = SendOptions::from_settings(&settings);
            if let Some(host) = host {
                options.host = host;
            }
            if let Some(port) = port {
                options.port = port;
            }

            println!("📤 发送到 {}:{}", options.host, options.port);
            let report = Sender::new(options)
                .send(&request, &ConsoleProgress)
                .await?;

            if report.all_sent() {
                println!("✅ 已发送 {} 个数据报，EOF 已发出", report.sent);
            } else {
                eprintln!(
                    "⚠️  {} 个数据报发送失败 (共 {})",
                    report.failed,
                    report.sent + report.failed
                );
            }
        }
        Commands::Config { init } => {
            let path = AppSettings::config_path();
            if init {
                settings.save()?;
                println!("✅ 配置已写入: {}", path.display());
            } else {
                println!("配置文件: {}", path.display());
            }
            println!("  监听: {}:{}", settings.listen_addr, settings.listen_port);
            println!("  目标: {}:{}", settings.server_host, settings.server_port);
            println!("  保存目录: {}", settings.output_dir.display());
            println!(
                "  节奏: 元数据后 {}ms, 数据块间 {}ms, EOF 前 {}ms",
                settings.after_metadata_ms, settings.between_chunks_ms, settings.before_sentinel_ms
            );
        }
    }

    Ok(())
}

fn print_summary(request: &TransferRequest) {
    println!("收件人: {}", request.email.trim());
    if let Some(message) = request.message() {
        println!("消息: {}", message);
    }
    for (label, attachment) in [("文件", request.file()), ("图片", request.image())] {
        if let Some(a) = attachment {
            println!(
                "{}: {} ({} 字节, {} 个数据包, 每包最多 {} 字节)",
                label,
                a.name,
                a.size(),
                a.chunk_count(),
                CHUNK_SIZE
            );
        }
    }
    if request.file().is_none() && request.image().is_none() {
        println!("没有附件，只发送消息");
    }
}
