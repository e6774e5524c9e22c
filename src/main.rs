use anyhow::{Context, Result};
use axum::serve;
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;

mod auth;
mod business;
mod cache;
mod challenge;
mod config;
mod crypto;
mod handler;
mod models;
mod policy;
mod router;
mod scraping;
mod utils;

#[cfg(test)]
mod test_support;

use business::PortalService;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    utils::init_logger();
    info!("初始化服务器中...");
    info!("请求超时：{}秒，缓存有效期：{}秒", config.timeout_secs, config.cache_ttl_secs);

    let service = Arc::new(PortalService::from_config(&config).context("初始化中转服务失败")?);

    // 定期清理过期缓存
    let janitor = Arc::clone(&service);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(janitor.cache_ttl().max(std::time::Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let purged = janitor.purge_cache();
            if purged > 0 {
                info!("已清理 {} 条过期缓存", purged);
            }
        }
    });

    // 创建路由
    let app = router::create_router(service);

    // 绑定地址到 TCP 监听器
    let listener = TcpListener::bind(config.bind).await.with_context(|| format!("无法绑定到地址 {}", config.bind))?;
    info!("服务器运行于 http://{}", config.bind);

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务器运行失败")?;

    info!("服务器已关闭");
    Ok(())
}

// Ctrl-C 时停止接收新请求, 处理完已有请求后退出
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("监听退出信号失败：{}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭服务器...");
}
