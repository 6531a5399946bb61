use std::collections::HashSet;

use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::jupiter::JupiterError;
use crate::concurrency::{Settled, settle_all};
use crate::monitoring::events;

use super::amount::Percentage;
use super::observer::DiscoveryObserver;
use super::ports::{QuoteQuery, QuoteService};
use super::types::{HeldBalance, ItemError, QuoteResult};

/// 报价参数：目标代币、比例与滑点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotePlan {
    pub target_mint: Pubkey,
    pub percentage: Percentage,
    pub slippage_bps: u16,
}

impl QuotePlan {
    pub fn new(target_mint: Pubkey, percentage: Percentage, slippage_bps: u16) -> Self {
        Self {
            target_mint,
            percentage,
            slippage_bps,
        }
    }

    /// 与后续提交金额一致的报价数量。
    pub fn amount_for(&self, balance: &HeldBalance) -> u64 {
        self.percentage.apply(balance.raw_amount)
    }
}

pub type QuoteSettlement = Settled<Pubkey, QuoteResult, ItemError>;

/// 为每个非零余额并发请求报价，互不影响。
///
/// 零余额直接跳过，不请求也不回调。尚未出现在 `known` 中的持仓会在发起报价前先触发
/// `on_asset`，保证同一代币的 asset 回调早于 quote / error 回调。
pub async fn resolve_quotes(
    service: &dyn QuoteService,
    balances: &[HeldBalance],
    plan: &QuotePlan,
    known: &HashSet<Pubkey>,
    observer: &dyn DiscoveryObserver,
    cancel: &CancellationToken,
) -> QuoteSettlement {
    let active: Vec<&HeldBalance> = balances
        .iter()
        .filter(|balance| balance.raw_amount > 0)
        .collect();
    debug!(
        target: "sweep::quote",
        requested = active.len(),
        skipped = balances.len() - active.len(),
        target = %plan.target_mint,
        percentage = %plan.percentage,
        "开始并发报价"
    );

    for balance in &active {
        if !known.contains(&balance.mint()) {
            observer.on_asset(balance);
        }
    }

    let tasks = active.into_iter().map(|balance| {
        let mint = balance.mint();
        (mint, async move {
            let outcome = quote_one(service, balance, plan).await;
            match &outcome {
                Ok(quote) => {
                    events::quote_resolved(&mint, quote.input_amount, quote.output_amount);
                    observer.on_quote(&mint, quote);
                }
                Err(err) => {
                    events::quote_failed(&mint, err);
                    observer.on_error(&mint, err);
                }
            }
            outcome
        })
    });
    settle_all(tasks, cancel).await
}

async fn quote_one(
    service: &dyn QuoteService,
    balance: &HeldBalance,
    plan: &QuotePlan,
) -> Result<QuoteResult, ItemError> {
    let mint = balance.mint();
    if mint == plan.target_mint {
        return Err(ItemError::quote("输入代币与目标代币相同"));
    }
    let amount = plan.amount_for(balance);
    if amount == 0 {
        return Err(ItemError::quote(format!(
            "按 {} 计算的报价数量为 0",
            plan.percentage
        )));
    }
    let query = QuoteQuery {
        input_mint: mint,
        output_mint: plan.target_mint,
        amount,
        slippage_bps: plan.slippage_bps,
    };
    service.quote(&query).await.map_err(quote_error)
}

fn quote_error(err: JupiterError) -> ItemError {
    if err.is_no_route() {
        ItemError::quote(format!("无可用报价路由: {}", err.describe()))
    } else {
        ItemError::quote(err.describe())
    }
}
