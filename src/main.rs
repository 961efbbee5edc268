use anyhow::Result;
use log::{info, warn};
use marktplaats_watcher::{
    Config, JsonSeenStore, ListingScanner, MarktplaatsClient, Scheduler, WebhookNotifier,
};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // 初始化日志
    init_logging(config.log_file.as_deref())?;

    info!("启动 Marktplaats 监控...");

    let client = MarktplaatsClient::new(&config.site_origin, config.search_timeout)?;

    let notifier =
        WebhookNotifier::new(config.webhook_url.clone()).with_timeout(config.notify_timeout);
    if !notifier.is_configured() {
        warn!("未设置 WEBHOOK_URL，新广告只会记录在日志中");
    }

    let store = JsonSeenStore::new(&config.seen_file);
    info!("历史记录文件: {}", store.path().display());

    let scanner = ListingScanner::new(
        Arc::new(client),
        Arc::new(notifier),
        Arc::new(store),
        config.site_origin.clone(),
    )
    .with_seen_cap(config.seen_max_per_term);

    let scheduler = Scheduler::new(scanner, &config.keywords_file)
        .with_intervals(config.poll_interval, config.config_retry_interval);

    // Ctrl-C 只在两轮扫描之间生效
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let cycles = scheduler.run(shutdown_rx).await;
    info!("监控正常关闭，共 {} 轮", cycles);

    Ok(())
}
