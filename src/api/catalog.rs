use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sweep::ports::AssetCatalogSource;
use crate::sweep::types::AssetCatalogEntry;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("代币目录请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("代币目录请求 {url} 超时（{timeout_ms}ms）")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("代币目录 {url} 返回状态 {status}")]
    Status { url: String, status: StatusCode },
    #[error("代币目录解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("代币目录为空")]
    Empty,
}

/// 从 Jupiter token list 拉取完整代币目录。
#[derive(Clone, Debug)]
pub struct TokenListClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl TokenListClient {
    pub fn new(client: reqwest::Client, url: String, timeout: Duration) -> Self {
        Self {
            url,
            client,
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AssetCatalogSource for TokenListClient {
    async fn fetch_all(&self) -> Result<Vec<AssetCatalogEntry>, CatalogError> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CatalogError::Timeout {
                        url: self.url.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    CatalogError::Http(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "sweep::discovery",
                url = %self.url,
                status = status.as_u16(),
                "代币目录返回非 200 状态"
            );
            return Err(CatalogError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let bytes = response.bytes().await?;
        let entries = parse_catalog(&bytes)?;
        debug!(
            target: "sweep::discovery",
            url = %self.url,
            entries = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "代币目录下载完成"
        );
        Ok(entries)
    }
}

/// 逐条解析目录，单条记录格式错误时跳过而不是让整个目录失效。
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<AssetCatalogEntry>, CatalogError> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let total = raw.len();
    let entries: Vec<AssetCatalogEntry> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if entries.len() < total {
        debug!(
            target: "sweep::discovery",
            skipped = total - entries.len(),
            "跳过格式不正确的目录记录"
        );
    }
    if entries.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(entries)
}
