//! Jupiter 聚合器 API 封装。

pub mod quote;
pub mod swap_instructions;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::{JupiterConfig, LoggingConfig, TimeoutConfig};
use crate::monitoring::metrics::prometheus_enabled;
use crate::sweep::ports::{QuoteQuery, QuoteService};
use crate::sweep::types::QuoteResult;

pub use quote::{QuoteRequest, QuoteResponse, QuoteResponsePayload};
pub use swap_instructions::{SwapInstructionsRequest, SwapInstructionsResponse};

#[derive(Debug, Error)]
pub enum JupiterError {
    #[error("Jupiter API 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("请求 {endpoint} 超时（{timeout_ms}ms）")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
        #[source]
        source: reqwest::Error,
    },
    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("请求 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("请求 {endpoint} 被限流，状态 {status}: {body}")]
    RateLimited {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("Jupiter 响应结构不符合预期: {0}")]
    Schema(String),
}

impl JupiterError {
    /// 展开错误链，便于写入单行日志或条目错误。
    pub fn describe(&self) -> String {
        use std::error::Error as _;
        let mut parts = vec![self.to_string()];
        let mut current = self.source();
        while let Some(err) = current {
            let text = err.to_string();
            if parts.last() != Some(&text) {
                parts.push(text);
            }
            current = err.source();
        }
        parts.join(" | caused by: ")
    }

    /// 判断是否为“无可用路由”一类的业务错误。
    pub fn is_no_route(&self) -> bool {
        match self {
            JupiterError::ApiStatus { status, body, .. } => {
                *status == StatusCode::BAD_REQUEST
                    && (body.contains("COULD_NOT_FIND_ANY_ROUTE")
                        || body.contains("TOKEN_NOT_TRADABLE"))
            }
            _ => false,
        }
    }
}

/// 请求失败时携带的指标标签。
struct FetchFailure {
    label: &'static str,
    http_status: Option<StatusCode>,
    error: JupiterError,
}

impl FetchFailure {
    fn new(label: &'static str, http_status: Option<StatusCode>, error: JupiterError) -> Self {
        Self {
            label,
            http_status,
            error,
        }
    }
}

#[derive(Clone, Debug)]
pub struct JupiterApiClient {
    quote_url: String,
    swap_url: String,
    client: reqwest::Client,
    quote_timeout: Duration,
    swap_timeout: Duration,
    slow_quote_warn_ms: u64,
    slow_swap_warn_ms: u64,
    only_direct_routes: bool,
    restrict_intermediate_tokens: bool,
    max_accounts: Option<u16>,
    wrap_and_unwrap_sol: bool,
    dynamic_compute_unit_limit: bool,
}

impl JupiterApiClient {
    pub fn new(
        client: reqwest::Client,
        jupiter: &JupiterConfig,
        timeouts: &TimeoutConfig,
        logging: &LoggingConfig,
    ) -> Self {
        Self {
            quote_url: jupiter.quote_url.clone(),
            swap_url: jupiter.swap_url.clone(),
            client,
            quote_timeout: Duration::from_millis(timeouts.quote_ms),
            swap_timeout: Duration::from_millis(timeouts.swap_ms),
            slow_quote_warn_ms: logging.slow_quote_warn_ms,
            slow_swap_warn_ms: logging.slow_swap_warn_ms,
            only_direct_routes: jupiter.only_direct_routes,
            restrict_intermediate_tokens: jupiter.restrict_intermediate_tokens,
            max_accounts: jupiter.max_accounts,
            wrap_and_unwrap_sol: jupiter.wrap_and_unwrap_sol,
            dynamic_compute_unit_limit: jupiter.dynamic_compute_unit_limit,
        }
    }

    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, JupiterError> {
        let started = Instant::now();
        trace!(
            target: "jupiter::quote",
            input_mint = %request.input_mint,
            output_mint = %request.output_mint,
            amount = request.amount,
            slippage_bps = request.slippage_bps,
            "开始请求 Jupiter 报价"
        );

        let http_request = self
            .client
            .get(&self.quote_url)
            .query(&request.to_query_params());
        let outcome = self
            .fetch_json(http_request, &self.quote_url, self.quote_timeout)
            .await
            .and_then(|(status, json)| {
                QuoteResponse::try_from_value(json).map_err(|err| {
                    FetchFailure::new(
                        "schema_error",
                        Some(status),
                        JupiterError::Schema(err.to_string()),
                    )
                })
            });

        let quote = match outcome {
            Ok(quote) => quote,
            Err(failure) => {
                record_metrics("quote", failure.label, None, failure.http_status);
                warn!(
                    target: "jupiter::quote",
                    endpoint = %self.quote_url,
                    input_mint = %request.input_mint,
                    status = failure.label,
                    error = %failure.error,
                    "Jupiter 报价失败"
                );
                return Err(failure.error);
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        if is_slow(elapsed_ms, self.slow_quote_warn_ms) {
            warn!(
                target: "jupiter::quote",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                threshold_ms = self.slow_quote_warn_ms,
                "Jupiter 报价耗时较长"
            );
        } else {
            debug!(
                target: "jupiter::quote",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                in_amount = quote.payload().in_amount,
                out_amount = quote.payload().out_amount,
                "Jupiter 报价完成"
            );
        }
        record_metrics("quote", "success", Some(elapsed_ms), Some(StatusCode::OK));
        Ok(quote)
    }

    pub async fn swap_instructions(
        &self,
        request: &SwapInstructionsRequest,
    ) -> Result<SwapInstructionsResponse, JupiterError> {
        let started = Instant::now();
        let mut payload = serde_json::to_value(request)
            .map_err(|err| JupiterError::Schema(format!("序列化 swap 请求失败: {err}")))?;
        prune_nulls(&mut payload);
        trace!(
            target: "jupiter::swap",
            user = %request.user_public_key,
            "即将请求 Jupiter swap 指令"
        );

        let http_request = self.client.post(&self.swap_url).json(&payload);
        let outcome = self
            .fetch_json(http_request, &self.swap_url, self.swap_timeout)
            .await
            .and_then(|(status, json)| {
                serde_json::from_value::<SwapInstructionsResponse>(json).map_err(|err| {
                    FetchFailure::new(
                        "schema_error",
                        Some(status),
                        JupiterError::Schema(err.to_string()),
                    )
                })
            });

        let instructions = match outcome {
            Ok(instructions) => instructions,
            Err(failure) => {
                record_metrics("swap", failure.label, None, failure.http_status);
                warn!(
                    target: "jupiter::swap",
                    endpoint = %self.swap_url,
                    status = failure.label,
                    error = %failure.error,
                    "Jupiter 指令请求失败"
                );
                return Err(failure.error);
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        if is_slow(elapsed_ms, self.slow_swap_warn_ms) {
            warn!(
                target: "jupiter::swap",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                threshold_ms = self.slow_swap_warn_ms,
                "Jupiter 指令请求耗时较长"
            );
        } else {
            debug!(
                target: "jupiter::swap",
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                compute_unit_limit = ?instructions.compute_unit_limit,
                setup_ix = instructions.setup_instructions.len(),
                "Jupiter 指令请求完成"
            );
        }
        record_metrics("swap", "success", Some(elapsed_ms), Some(StatusCode::OK));
        Ok(instructions)
    }

    async fn fetch_json(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<(StatusCode, Value), FetchFailure> {
        let timeout_error = |source: reqwest::Error| JupiterError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.as_millis() as u64,
            source,
        };

        let response = request.timeout(timeout).send().await.map_err(|err| {
            if err.is_timeout() {
                FetchFailure::new("timeout", None, timeout_error(err))
            } else {
                FetchFailure::new("transport_error", None, JupiterError::from(err))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                FetchFailure::new("timeout", Some(status), timeout_error(err))
            } else {
                FetchFailure::new("read_error", Some(status), JupiterError::from(err))
            }
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchFailure::new(
                "rate_limited",
                Some(status),
                JupiterError::RateLimited {
                    endpoint: endpoint.to_string(),
                    status,
                    body: summarize_error_body(body),
                },
            ));
        }

        if !status.is_success() {
            return Err(FetchFailure::new(
                "http_error",
                Some(status),
                JupiterError::ApiStatus {
                    endpoint: endpoint.to_string(),
                    status,
                    body: summarize_error_body(body),
                },
            ));
        }

        let json: Value = serde_json::from_str(&body).map_err(|err| {
            FetchFailure::new("decode_error", Some(status), JupiterError::Json(err))
        })?;
        Ok((status, json))
    }
}

#[async_trait]
impl QuoteService for JupiterApiClient {
    async fn quote(&self, query: &QuoteQuery) -> Result<QuoteResult, JupiterError> {
        let mut request = QuoteRequest::new(
            query.input_mint,
            query.output_mint,
            query.amount,
            query.slippage_bps,
        );
        request.only_direct_routes = Some(self.only_direct_routes);
        request.restrict_intermediate_tokens = Some(self.restrict_intermediate_tokens);
        request.max_accounts = self.max_accounts;
        let response = JupiterApiClient::quote(self, &request).await?;
        Ok(response.into_result())
    }

    async fn swap_instructions(
        &self,
        quote: &QuoteResult,
        user: &Pubkey,
    ) -> Result<SwapInstructionsResponse, JupiterError> {
        let mut request = SwapInstructionsRequest::new(quote.route.clone(), *user);
        request.wrap_and_unwrap_sol = self.wrap_and_unwrap_sol;
        request.dynamic_compute_unit_limit = Some(self.dynamic_compute_unit_limit);
        JupiterApiClient::swap_instructions(self, &request).await
    }
}

fn record_metrics(
    stage: &'static str,
    status: &'static str,
    elapsed_ms: Option<f64>,
    http_status: Option<StatusCode>,
) {
    if !prometheus_enabled() {
        return;
    }
    let http_status = http_status
        .map(|code| code.as_u16().to_string())
        .unwrap_or_else(|| "none".to_string());
    match stage {
        "quote" => {
            counter!(
                "scoop_jupiter_quote_total",
                "status" => status,
                "http_status" => http_status
            )
            .increment(1);
            if let Some(value) = elapsed_ms {
                histogram!("scoop_jupiter_quote_latency_ms", "status" => status).record(value);
            }
        }
        _ => {
            counter!(
                "scoop_jupiter_swap_total",
                "status" => status,
                "http_status" => http_status
            )
            .increment(1);
            if let Some(value) = elapsed_ms {
                histogram!("scoop_jupiter_swap_latency_ms", "status" => status).record(value);
            }
        }
    }
}

/// 超过阈值的调用以 warn 级别记录。
fn is_slow(elapsed_ms: f64, threshold_ms: u64) -> bool {
    elapsed_ms > threshold_ms as f64
}

fn summarize_error_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut single_line = trimmed.replace(['\n', '\r'], " ");
    const MAX_LEN: usize = 512;
    if single_line.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !single_line.is_char_boundary(cut) {
            cut -= 1;
        }
        single_line.truncate(cut);
        single_line.push('…');
    }
    single_line
}

fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, entry| {
                prune_nulls(entry);
                !entry.is_null()
            });
        }
        Value::Array(array) => {
            for item in array.iter_mut() {
                prune_nulls(item);
            }
            array.retain(|item| !item.is_null());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prune_nulls_drops_nested_nulls() {
        let mut value = json!({
            "a": null,
            "b": {"c": null, "d": 1},
            "e": [null, {"f": null}]
        });
        prune_nulls(&mut value);
        assert_eq!(value, json!({"b": {"d": 1}, "e": [{}]}));
    }

    #[test]
    fn summarize_truncates_long_bodies() {
        let body = "x".repeat(600);
        let summary = summarize_error_body(body);
        assert!(summary.ends_with('…'));
        assert_eq!(summary.chars().count(), 513);
        assert_eq!(summarize_error_body("  \n".to_string()), "(empty response body)");
    }

    #[test]
    fn slow_threshold_is_exclusive() {
        assert!(!is_slow(1_500.0, 1_500));
        assert!(is_slow(1_500.5, 1_500));
        assert!(!is_slow(3.2, 1_500));
    }

    #[test]
    fn no_route_errors_are_recognised() {
        let err = JupiterError::ApiStatus {
            endpoint: "quote".to_string(),
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error":"Could not find any route","errorCode":"COULD_NOT_FIND_ANY_ROUTE"}"#
                .to_string(),
        };
        assert!(err.is_no_route());
        assert!(!JupiterError::Schema("x".to_string()).is_no_route());
    }
}
