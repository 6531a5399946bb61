use serde::Deserialize;

use crate::sweep::amount::Percentage;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoopConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub lander: LanderConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_url: super::default_rpc_url(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// 支持 JSON 数组、逗号分隔字节或 base58 字符串。
    #[serde(default)]
    pub private_key: String,
    /// 为 true 时跳过批次确认提示。
    #[serde(default)]
    pub auto_approve: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingProfile {
    /// 压低 hyper / reqwest 等依赖的输出。
    #[default]
    Lean,
    Verbose,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub profile: LoggingProfile,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_slow_quote_warn_ms")]
    pub slow_quote_warn_ms: u64,
    #[serde(default = "super::default_slow_swap_warn_ms")]
    pub slow_swap_warn_ms: u64,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            profile: LoggingProfile::Lean,
            json: false,
            slow_quote_warn_ms: super::default_slow_quote_warn_ms(),
            slow_swap_warn_ms: super::default_slow_swap_warn_ms(),
            timezone_offset_hours: super::default_timezone_offset_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JupiterConfig {
    #[serde(default = "super::default_quote_url")]
    pub quote_url: String,
    #[serde(default = "super::default_swap_url")]
    pub swap_url: String,
    #[serde(default = "super::default_catalog_url")]
    pub catalog_url: String,
    #[serde(default)]
    pub only_direct_routes: bool,
    #[serde(default = "super::default_true")]
    pub restrict_intermediate_tokens: bool,
    #[serde(default)]
    pub max_accounts: Option<u16>,
    #[serde(default = "super::default_true")]
    pub wrap_and_unwrap_sol: bool,
    #[serde(default = "super::default_true")]
    pub dynamic_compute_unit_limit: bool,
    /// 报价成功后立即预取指令集，以便提前发现无法构建的路由。
    #[serde(default)]
    pub prefetch_instructions: bool,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            quote_url: super::default_quote_url(),
            swap_url: super::default_swap_url(),
            catalog_url: super::default_catalog_url(),
            only_direct_routes: false,
            restrict_intermediate_tokens: true,
            max_accounts: None,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prefetch_instructions: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "super::default_target_mint")]
    pub target_mint: String,
    #[serde(default = "super::default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default)]
    pub percentage: Percentage,
    #[serde(default = "super::default_excluded_symbols")]
    pub excluded_symbols: Vec<String>,
    #[serde(default)]
    pub verified_only: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            target_mint: super::default_target_mint(),
            slippage_bps: super::default_slippage_bps(),
            percentage: Percentage::FULL,
            excluded_symbols: super::default_excluded_symbols(),
            verified_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "super::default_quote_timeout_ms")]
    pub quote_ms: u64,
    #[serde(default = "super::default_swap_timeout_ms")]
    pub swap_ms: u64,
    #[serde(default = "super::default_catalog_timeout_ms")]
    pub catalog_ms: u64,
    #[serde(default = "super::default_rpc_timeout_ms")]
    pub rpc_ms: u64,
    #[serde(default = "super::default_confirm_timeout_ms")]
    pub confirm_ms: u64,
    #[serde(default = "super::default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            quote_ms: super::default_quote_timeout_ms(),
            swap_ms: super::default_swap_timeout_ms(),
            catalog_ms: super::default_catalog_timeout_ms(),
            rpc_ms: super::default_rpc_timeout_ms(),
            confirm_ms: super::default_confirm_timeout_ms(),
            confirm_poll_ms: super::default_confirm_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanderConfig {
    #[serde(default)]
    pub skip_preflight: bool,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default = "super::default_commitment")]
    pub commitment: String,
}

impl Default for LanderConfig {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            max_retries: None,
            commitment: super::default_commitment(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}
