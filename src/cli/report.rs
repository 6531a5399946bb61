//! 终端输出：目录概况、清单表格与提交结果。

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::sweep::listing::{ListingFilter, SweepTotals, item_preview, list_items};
use crate::sweep::types::Resolution;
use crate::sweep::{AssetCatalog, ItemError, LifecycleState, SubmissionObserver, SubmissionReport, SweepItem};

pub fn print_catalog(catalog: &AssetCatalog) {
    println!(
        "代币目录：共 {} 个，已验证 {} 个",
        catalog.len(),
        catalog.verified_count()
    );
}

pub fn print_listing(items: &[SweepItem], totals: &SweepTotals) {
    let filter = ListingFilter {
        non_zero_only: true,
        ..ListingFilter::default()
    };
    let listed = list_items(items, &filter);
    if listed.is_empty() {
        println!("没有可清扫的代币余额");
        return;
    }
    println!(
        "{:<3} {:<10} {:>20} {:>16} {:>16}  {}",
        "", "符号", "余额", "预计获得", "剩余", "状态"
    );
    for item in listed {
        println!("{}", format_row(item));
    }
    println!(
        "已勾选 {} 个代币，报价合计 {}，按比例预计获得 {}，可回收租金 {} lamports",
        totals.items, totals.quoted_output, totals.expected_output, totals.rent_reclaim_lamports
    );
}

fn format_row(item: &SweepItem) -> String {
    let preview = item_preview(item);
    let mark = if item.included { "[x]" } else { "[ ]" };
    let status = match item.resolution() {
        Resolution::Pending => item.state.as_str().to_string(),
        Resolution::Quoted => item.state.as_str().to_string(),
        Resolution::NoQuote | Resolution::NoRoute | Resolution::Failed => item
            .last_error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| item.state.as_str().to_string()),
    };
    format!(
        "{:<3} {:<10} {:>20} {:>16} {:>16}  {}",
        mark,
        item.balance.asset.symbol,
        item.balance.ui_amount(),
        preview.expected_output,
        preview.left_behind,
        status
    )
}

pub fn print_submission(report: &SubmissionReport) {
    println!(
        "{} 批次：成功 {} 笔，失败 {} 笔",
        report.kind,
        report.landed.len(),
        report.failed.len()
    );
    for (mint, signature) in &report.landed {
        println!("  ✅ {mint} {signature}");
    }
    for (mint, err) in &report.failed {
        println!("  ❌ {mint} {err}");
    }
}

/// 逐笔打印提交进度。
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress;

impl SubmissionObserver for ConsoleProgress {
    fn on_state(&self, mint: &Pubkey, state: LifecycleState) {
        if !state.is_terminal() {
            println!("  ⏳ {mint} {state}");
        }
    }

    fn on_signature(&self, mint: &Pubkey, signature: &Signature) {
        println!("  ✍️  {mint} {signature}");
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        println!("  ⚠️  {mint} {error}");
    }
}
