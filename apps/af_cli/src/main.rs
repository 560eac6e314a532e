// apps/af_cli/src/main.rs

//! AeroFlux 命令行界面
//!
//! 可压缩多块结构网格求解器的命令行工具。
//!
//! # 架构层级
//!
//! 本模块属于 Layer 5: Application——只组装配置、网格与
//! 求解层级，数值全部在 af_physics 内完成。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// AeroFlux 求解器命令行工具
#[derive(Parser)]
#[command(name = "af_cli")]
#[command(author = "AeroFlux Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AeroFlux compressible multi-block solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行模拟
    Run(commands::run::RunArgs),
    /// 显示网格信息
    Info(commands::info::InfoArgs),
    /// 校验配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令；任何核心错误以非零码退出
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
