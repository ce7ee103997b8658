//! 分诊服务器主程序

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use triage_admin::ConfigManager;
use triage_integration::{ApiServer, ApiState, GeminiBackend, TriageServiceClient};
use triage_workflow::{InMemoryRoster, TriageEngine};

/// 分诊服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "triage-server")]
#[command(about = "急诊分诊 (ESI) REST 服务器")]
struct Args {
    /// 监听主机，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 监听端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 打印生效配置后退出
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut manager = ConfigManager::load(args.config.as_deref())?;
    {
        let config = manager.config_mut();
        if let Some(host) = args.host {
            config.server.host = host;
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if let Some(level) = args.log_level {
            config.logging.level = level;
        }
    }

    if args.print_config {
        println!("{}", manager.to_toml_string()?);
        return Ok(());
    }

    // 初始化日志，RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&manager.config().logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("启动分诊服务器...");
    manager.validate()?;

    let config = manager.config();
    info!("分诊服务器配置:");
    info!("  监听地址: {}", config.server.bind_addr());
    info!("  推理模型: {}", config.reasoning.model);
    info!("  请求超时: {}s", config.reasoning.timeout_secs);
    info!("  最大重试: {}", config.reasoning.max_retries);

    let backend = Arc::new(GeminiBackend::new(config.reasoning.gemini_settings()));
    let client = TriageServiceClient::new(backend, config.reasoning.client_settings());
    let engine = TriageEngine::new(Arc::new(InMemoryRoster::new()), Arc::new(client.clone()));

    let server = ApiServer::new(ApiState::new(engine, client), config.server.enable_cors);
    if let Err(e) = server.run(&config.server.bind_addr()).await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}
