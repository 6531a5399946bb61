use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::config::PrometheusConfig;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 按配置安装 Prometheus exporter，未启用时返回 `None`。重复调用复用首次的监听地址。
pub fn init_prometheus(config: &PrometheusConfig) -> Result<Option<SocketAddr>> {
    if !config.enable {
        return Ok(None);
    }
    let addr = EXPORTER.get_or_try_init(|| -> Result<SocketAddr> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .with_context(|| format!("invalid prometheus listen address: {}", config.listen))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install prometheus exporter")?;
        PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
        info!(target: "monitoring", listen = %addr, "Prometheus exporter 已启动");
        Ok(addr)
    })?;
    Ok(Some(*addr))
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}
