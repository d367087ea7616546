// apps/fv_cli/src/main.rs

//! Finvol 命令行界面
//!
//! 生成块网格、装配稳态扩散方程并用配置的线性求解器求解，可选在进程内分区运行。
//!
//! 库 crate 通过 `log` 门面输出日志，这里安装的 `tracing-subscriber` 同时接收这些记录。

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Finvol 有限体积 LDU 求解器命令行工具
#[derive(Parser)]
#[command(name = "fv_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Finvol finite-volume LDU solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行算例
    Run(commands::run::RunArgs),
    /// 显示网格与寻址信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        l @ ("trace" | "debug" | "info" | "warn" | "error") => l.to_string(),
        _ => "info".to_string(),
    };
    // RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("日志初始化失败: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            if let Some(fv) = e.downcast_ref::<fv_foundation::FvError>() {
                if fv.is_fatal() {
                    tracing::error!("结构性错误，终止运行");
                }
            }
            ExitCode::FAILURE
        }
    }
}
