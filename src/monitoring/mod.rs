//! 日志事件与 Prometheus 指标。

pub mod events;
pub mod metrics;

pub use metrics::{init_prometheus, prometheus_enabled};
