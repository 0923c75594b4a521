mod cli;

use clap::Parser;
use cli::Cli;
use kidsnote_downloader::{
    logging, AppConfig, Credentials, DateRange, DownloadOrchestrator, DownloadRequest,
    FileSessionStore, KidsnoteClient, SessionStore, TracingEventSink,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 🔥 先读取配置中的日志部分，失败时使用默认日志配置
    let preloaded = AppConfig::load_from_file(&cli.config).await;
    let log_config = preloaded
        .as_ref()
        .map(|c| c.log.clone())
        .unwrap_or_default();

    // 🔥 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&log_config);

    info!("Kidsnote Downloader v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let mut config = match preloaded {
        Ok(config) => config,
        Err(_) => AppConfig::load_or_default(&cli.config).await,
    };
    if let Some(output) = &cli.output {
        config.download.download_dir = output.clone();
        config.download.fallback_dirs.clear();
    }

    let store: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::new(config.session.session_file.clone()));

    if cli.logout {
        let client = KidsnoteClient::new(&config.api, store)?;
        client.logout().await?;
        return Ok(());
    }

    let orchestrator =
        DownloadOrchestrator::from_config(&config, store, Arc::new(TracingEventSink))?;

    // Ctrl+C 只在两个孩子之间生效
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到 Ctrl+C，当前孩子处理完后停止...");
            cancel.cancel();
        }
    });

    let credentials = match (cli.username, cli.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        _ => None,
    };

    if cli.list_children {
        let children = orchestrator.sign_in(credentials.as_ref()).await?;
        for child in children {
            println!("{}. {} (id: {})", child.ordinal_index, child.name, child.id);
        }
        return Ok(());
    }

    let request = DownloadRequest {
        credentials,
        kind: cli.kind,
        content: cli.content,
        children: cli.children,
        range: DateRange::new(cli.start, cli.end),
        limit: cli.page_size,
    };

    match orchestrator.run(&request).await {
        Ok(summary) => {
            info!(
                "✓ 完成: 图片 {} 个，视频 {} 个，失败 {} 个，目录 {}",
                summary.totals.images_downloaded,
                summary.totals.videos_downloaded,
                summary.totals.failed,
                summary.download_dir.display()
            );
            for failure in &summary.failures {
                error!("孩子 {} ({}) 未完成: {}", failure.child_name, failure.child_id, failure.error);
            }
            if summary.cancelled {
                info!("本次下载已被取消");
            }
            Ok(())
        }
        Err(e) => {
            error!("下载失败: {}", e);
            Err(e.into())
        }
    }
}
