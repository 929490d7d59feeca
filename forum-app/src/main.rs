//! # 论坛宿主程序
//!
//! 组合注册表、执行启动服务，并打印每个服务键的默认绑定。

mod search;

use anyhow::Context;
use clap::Parser;
use infrastructure_composition::forum::{LocalizationProvider, StopWatch, ThemeProvider};
use infrastructure_composition::{ForumInfrastructure, LoggingConfig};
use search::{search_assembly, SearchIndex};
use std::path::PathBuf;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "forum-app")]
#[command(about = "论坛组合根宿主程序")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 插件清单目录
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// 插件扫描模式
    #[arg(long)]
    pattern: Option<String>,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// 输出 JSON 格式日志
    #[arg(long)]
    json_logs: bool,

    /// 以 JSON 打印组合报告
    #[arg(long)]
    report_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let infrastructure = match build_infrastructure(&args).await {
        Ok(infrastructure) => infrastructure,
        Err(e) => {
            error!("构建论坛基础设施失败: {:#}", e);
            return Err(e);
        }
    };

    infrastructure.start().await.context("执行启动服务失败")?;

    print_bindings(&infrastructure);
    if args.report_json {
        println!("{}", infrastructure.report().to_json()?);
    }

    demonstrate_request(&infrastructure)?;

    infrastructure.stop().await?;
    info!("论坛宿主程序已退出");
    Ok(())
}

/// 构建基础设施
async fn build_infrastructure(args: &Args) -> anyhow::Result<ForumInfrastructure> {
    let logging = LoggingConfig::default()
        .with_level(args.log_level)
        .with_json(args.json_logs);

    let mut builder = ForumInfrastructure::builder()
        .with_logging(logging)
        .with_plugin(search_assembly());

    if let Some(config) = &args.config {
        builder = builder.with_config_file(config);
    }
    if let Some(dir) = &args.plugins_dir {
        builder = builder.with_plugins_dir(dir);
    }
    if let Some(pattern) = &args.pattern {
        builder = builder.with_pattern(pattern.clone());
    }

    builder.build().await.context("组合注册表失败")
}

/// 打印绑定报告
fn print_bindings(infrastructure: &ForumInfrastructure) {
    let scan = infrastructure.scan_report();
    println!("插件单元: {}", scan.names().join(", "));
    for skipped in &scan.skipped {
        println!("已跳过: {} ({})", skipped.unit, skipped.reason);
    }

    println!("{:<64} {:<40} {:<20} {:<18} {}", "服务", "默认实现", "生命周期", "阶段", "提供者");
    for binding in infrastructure.bindings() {
        println!(
            "{:<64} {:<40} {:<20} {:<18} {}",
            binding.service,
            binding.implementation,
            format!("{:?}", binding.lifetime),
            binding.phase,
            binding.providers
        );
    }
}

/// 演示一次请求内的解析
fn demonstrate_request(infrastructure: &ForumInfrastructure) -> anyhow::Result<()> {
    let request = infrastructure.begin_request("GET /forum");
    let watch = request.resolve::<dyn StopWatch>()?;

    let modules = infrastructure.initialize_forum_modules(&request)?;
    info!("已初始化论坛模块: {:?}", modules);

    let theme = request.resolve::<dyn ThemeProvider>()?;
    let localization = request.resolve::<dyn LocalizationProvider>()?;
    info!(
        "主题 {}, 标题 {}",
        theme.theme(),
        localization.text("DEFAULT", "FORUM_TITLE")
    );

    if let Some(index) = request.try_resolve::<dyn SearchIndex>()? {
        info!("搜索索引主题数: {}", index.indexed_topics());
    }

    info!("请求耗时: {:?}", watch.elapsed());
    request.dispose();
    Ok(())
}
