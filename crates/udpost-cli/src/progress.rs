//! 控制台进度输出

use std::io::Write;
use udpost_core::transfer::outbound::percent;
use udpost_core::{PayloadKind, SendProgressCallback, TransferReport};

pub struct ConsoleProgress;

impl SendProgressCallback for ConsoleProgress {
    fn on_status(&self, status: &str) {
        println!("   {}", status);
    }

    fn on_progress(&self, kind: PayloadKind, sent: u64, total: u64) {
        let label = match kind {
            PayloadKind::File => "文件",
            PayloadKind::Image => "图片",
        };
        print!(
            "\r   发送{}: {}/{} 个数据包 ({}%)",
            label,
            sent,
            total,
            percent(sent, total)
        );
        if sent == total {
            println!();
        }
        let _ = std::io::stdout().flush();
    }

    fn on_complete(&self, _report: &TransferReport) {}

    fn on_error(&self, error: &str) {
        eprintln!("❌ {}", error);
    }
}
