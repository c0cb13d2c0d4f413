//! Web 服务器主程序入口

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::oneshot;

use notelingo::config::AppConfig;
use notelingo::env::{core::NoColor, generate_env_docs, EnvVar};
use notelingo::logging::init_logging;
use notelingo::translator::HttpTranslator;
use notelingo::web::WebServer;
use notelingo::Application;

#[derive(Parser, Debug)]
#[command(name = "notelingo-web", version, about = "Note service with asynchronous translation")]
struct Args {
    /// Config file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides config and environment
    #[arg(short, long)]
    bind: Option<String>,

    /// Port number, overrides config and environment
    #[arg(short, long)]
    port: Option<u16>,

    /// Print environment variable documentation and exit
    #[arg(long)]
    print_env_docs: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_env_docs {
        print!("{}", generate_env_docs());
        return Ok(());
    }

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let addr = config.socket_addr()?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(&config.log_level, NoColor::get_or_default(false))?;
    tracing::info!("运行模式: {}", config.mode);

    let translator = Arc::new(HttpTranslator::new(config.translator.clone())?);
    let app = Application::build(&config, translator)?;
    let state = app.app_state();
    let janitor = app.spawn_cache_janitor(config.cache.ttl());

    let (stop_workers, workers_stopped) = oneshot::channel::<()>();
    let (_service, workers) = app.spawn_workers(async move {
        // 发送端被丢弃同样视为停止信号
        let _ = workers_stopped.await;
    });

    WebServer::new(addr, state)
        .start_with_shutdown(shutdown_signal())
        .await?;

    let _ = stop_workers.send(());
    if let Err(e) = workers.await {
        tracing::error!("翻译工作池异常退出: {}", e);
    }
    if let Some(janitor) = janitor {
        janitor.abort();
    }

    tracing::info!("已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听 Ctrl-C 信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到停止信号，开始关闭");
}
