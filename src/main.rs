use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod config;
mod shutdown;

use app::Application;
use config::AppConfig;
use shutdown::ShutdownManager;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");
    init_logging(log_level, log_format)?;

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).context("加载配置失败")?;

    // 命令行优先于配置文件
    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database.url = url.clone();
    }
    if let Some(queues) = matches.get_many::<String>("queue") {
        config.worker.queues = queues.cloned().collect();
    }

    info!("启动JobFlow");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }
    info!(
        "调度器: {} / 工作器: {} (队列: {:?})",
        if config.scheduler.enabled { "启用" } else { "禁用" },
        if config.worker.enabled { "启用" } else { "禁用" },
        config.worker.queues
    );

    let app = Arc::new(Application::new(config).await?);

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe();
    let app_handle = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, app_handle)
        .await
        .is_err()
    {
        warn!("应用关闭超时，强制退出");
    } else {
        info!("应用已优雅关闭");
    }

    info!("JobFlow已退出");
    Ok(())
}

fn build_cli() -> Command {
    Command::new("jobflow")
        .version(env!("CARGO_PKG_VERSION"))
        .about("作业调度与分布式执行引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("数据库连接地址，覆盖配置文件"),
        )
        .arg(
            Arg::new("queue")
                .short('q')
                .long("queue")
                .value_name("NAME")
                .action(ArgAction::Append)
                .help("工作器消费的队列，可多次指定，覆盖配置文件"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info")
                .help("日志级别"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_parser(["json", "pretty"])
                .default_value("pretty")
                .help("日志输出格式"),
        )
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }
    Ok(())
}

/// 阻塞到收到 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("安装SIGTERM处理器失败: {e}");
                let _ = signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("安装Ctrl+C处理器失败: {e}");
                }
            }
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = signal::ctrl_c().await {
        error!("安装Ctrl+C处理器失败: {e}");
    }
}
