use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use crate::api::serde_helpers::field_as_string;
use crate::sweep::types::QuoteResult;

/// Jupiter 支持的 swap 模式，清扫只使用 ExactIn。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SwapMode {
    #[default]
    #[serde(rename = "ExactIn", alias = "exactIn")]
    ExactIn,
    #[serde(rename = "ExactOut", alias = "exactOut")]
    ExactOut,
}

impl SwapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

/// `/quote` 请求，使用查询字符串传参。
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub swap_mode: SwapMode,
    pub slippage_bps: u16,
    pub only_direct_routes: Option<bool>,
    pub restrict_intermediate_tokens: Option<bool>,
    pub max_accounts: Option<u16>,
}

impl QuoteRequest {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            swap_mode: SwapMode::ExactIn,
            slippage_bps,
            only_direct_routes: None,
            restrict_intermediate_tokens: None,
            max_accounts: None,
        }
    }

    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("inputMint", self.input_mint.to_string()),
            ("outputMint", self.output_mint.to_string()),
            ("amount", self.amount.to_string()),
            ("swapMode", self.swap_mode.as_str().to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
        ];
        if let Some(value) = self.only_direct_routes {
            params.push(("onlyDirectRoutes", value.to_string()));
        }
        if let Some(value) = self.restrict_intermediate_tokens {
            params.push(("restrictIntermediateTokens", value.to_string()));
        }
        if let Some(value) = self.max_accounts {
            params.push(("maxAccounts", value.to_string()));
        }
        params
    }
}

/// `/quote` 响应中清扫关心的字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponsePayload {
    #[serde(with = "field_as_string")]
    pub input_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub output_mint: Pubkey,
    #[serde(with = "field_as_string")]
    pub in_amount: u64,
    #[serde(with = "field_as_string")]
    pub out_amount: u64,
    #[serde(with = "field_as_string")]
    pub other_amount_threshold: u64,
    #[serde(default)]
    pub swap_mode: SwapMode,
    pub slippage_bps: u16,
    #[serde(default)]
    pub price_impact_pct: Decimal,
    #[serde(default)]
    pub context_slot: Option<u64>,
    #[serde(default)]
    pub time_taken: Option<f64>,
    #[serde(default)]
    pub route_plan: Vec<Value>,
}

/// 解析后的报价，同时保留原始 JSON 以便回传给 `/swap-instructions`。
#[derive(Clone, Debug)]
pub struct QuoteResponse {
    data: QuoteResponsePayload,
    raw: Value,
}

impl QuoteResponse {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        let data: QuoteResponsePayload = serde_json::from_value(value.clone())?;
        Ok(Self { data, raw: value })
    }

    pub fn payload(&self) -> &QuoteResponsePayload {
        &self.data
    }

    pub fn into_result(self) -> QuoteResult {
        let QuoteResponse { data, raw } = self;
        QuoteResult {
            input_mint: data.input_mint,
            output_mint: data.output_mint,
            input_amount: data.in_amount,
            output_amount: data.out_amount,
            min_output_amount: data.other_amount_threshold,
            slippage_bps: data.slippage_bps,
            price_impact_pct: data.price_impact_pct,
            route: raw,
        }
    }
}
