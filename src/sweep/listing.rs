//! 清单的展示视图：过滤、排序与收益预估。所有金额均为整数最小单位。

use solana_sdk::pubkey::Pubkey;

use super::amount::Percentage;
use super::types::{LEGACY_RENT_RECLAIM_LAMPORTS, SweepItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Symbol,
    Balance,
    Output,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// 符号子串，忽略大小写。
    pub query: Option<String>,
    pub non_zero_only: bool,
    pub verified_only: bool,
    pub sort: SortKey,
    pub direction: SortDirection,
}

pub fn list_items<'a>(items: &'a [SweepItem], filter: &ListingFilter) -> Vec<&'a SweepItem> {
    let query = filter
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let mut listed: Vec<&SweepItem> = items
        .iter()
        .filter(|item| !filter.non_zero_only || item.balance.raw_amount > 0)
        .filter(|item| !filter.verified_only || item.balance.asset.is_verified())
        .filter(|item| match &query {
            Some(q) => item.balance.asset.symbol.to_lowercase().contains(q.as_str()),
            None => true,
        })
        .collect();

    listed.sort_by(|a, b| {
        let ordering = match filter.sort {
            SortKey::Symbol => a
                .balance
                .asset
                .symbol
                .to_lowercase()
                .cmp(&b.balance.asset.symbol.to_lowercase()),
            SortKey::Balance => a.balance.ui_amount().cmp(&b.balance.ui_amount()),
            SortKey::Output => output_of(a).cmp(&output_of(b)),
        };
        let ordering = ordering.then_with(|| a.mint().to_bytes().cmp(&b.mint().to_bytes()));
        match filter.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    listed
}

/// 未报价的代币排在已报价之前。
fn output_of(item: &SweepItem) -> Option<u64> {
    item.quote_result().map(|quote| quote.output_amount)
}

/// 单个代币清扫后的预估结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPreview {
    pub mint: Pubkey,
    /// 报价未覆盖、仍留在账户里的数量。
    pub left_behind: u64,
    /// 预计获得的目标代币数量，未报价时为 0。
    pub expected_output: u64,
    pub rent_reclaim_lamports: u64,
}

pub fn item_preview(item: &SweepItem) -> ItemPreview {
    let balance = &item.balance;
    // 未报价时按旧版 Token 账户估算租金
    let (left_behind, expected_output, rent_reclaim_lamports) = match item.quote_result() {
        Some(quote) => (
            balance.raw_amount.saturating_sub(quote.input_amount),
            quote.output_amount,
            balance.program.rent_reclaim_lamports(),
        ),
        None => (balance.raw_amount, 0, LEGACY_RENT_RECLAIM_LAMPORTS),
    };
    ItemPreview {
        mint: balance.mint(),
        left_behind,
        expected_output,
        rent_reclaim_lamports,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepTotals {
    pub items: usize,
    /// 已勾选且已报价代币的目标数量之和。
    pub quoted_output: u64,
    /// 按比例折算后的预计到账数量。
    pub expected_output: u64,
    pub rent_reclaim_lamports: u64,
}

pub fn sweep_totals(items: &[SweepItem], percentage: Percentage) -> SweepTotals {
    let mut totals = SweepTotals::default();
    for item in items.iter().filter(|item| item.included) {
        let Some(quote) = item.quote_result() else {
            continue;
        };
        totals.items += 1;
        totals.quoted_output = totals.quoted_output.saturating_add(quote.output_amount);
        totals.rent_reclaim_lamports = totals
            .rent_reclaim_lamports
            .saturating_add(item.balance.program.rent_reclaim_lamports());
    }
    totals.expected_output = percentage.apply(totals.quoted_output);
    totals
}
