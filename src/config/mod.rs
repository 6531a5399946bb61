use std::env;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

pub const ENV_RPC_URL: &str = "SCOOP_RPC_URL";
pub const ENV_PRIVATE_KEY: &str = "SCOOP_PRIVATE_KEY";
pub const ENV_TARGET_MINT: &str = "SCOOP_TARGET_MINT";

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// 默认不参与清扫的代币：稳定币与主流 LST。
pub const DEFAULT_EXCLUDED_SYMBOLS: &[&str] = &[
    "USDC", "USDT", "mSOL", "JitoSOL", "bSOL", "mrgnLST", "jSOL", "stSOL", "scnSOL", "LST",
];

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_slow_quote_warn_ms() -> u64 {
    1_500
}

pub(crate) fn default_slow_swap_warn_ms() -> u64 {
    2_000
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_quote_url() -> String {
    "https://lite-api.jup.ag/swap/v1/quote".to_string()
}

pub(crate) fn default_swap_url() -> String {
    "https://lite-api.jup.ag/swap/v1/swap-instructions".to_string()
}

pub(crate) fn default_catalog_url() -> String {
    "https://tokens.jup.ag/tokens".to_string()
}

pub(crate) fn default_target_mint() -> String {
    USDC_MINT.to_string()
}

pub(crate) fn default_slippage_bps() -> u16 {
    1_500
}

pub(crate) fn default_excluded_symbols() -> Vec<String> {
    DEFAULT_EXCLUDED_SYMBOLS
        .iter()
        .map(|symbol| symbol.to_string())
        .collect()
}

pub(crate) fn default_quote_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_swap_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_catalog_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_rpc_timeout_ms() -> u64 {
    30_000
}

pub(crate) fn default_confirm_timeout_ms() -> u64 {
    60_000
}

pub(crate) fn default_confirm_poll_ms() -> u64 {
    1_000
}

pub(crate) fn default_commitment() -> String {
    "confirmed".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

/// 环境变量优先于配置文件。
pub fn apply_env_overrides(config: &mut ScoopConfig) {
    apply_overrides_from(config, |key| env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut ScoopConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    if let Some(url) = read(ENV_RPC_URL) {
        config.global.rpc_url = url;
    }
    if let Some(key) = read(ENV_PRIVATE_KEY) {
        config.global.wallet.private_key = key;
    }
    if let Some(mint) = read(ENV_TARGET_MINT) {
        config.sweep.target_mint = mint;
    }
}
