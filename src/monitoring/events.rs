use std::time::Duration;

use metrics::{counter, histogram};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::sweep::types::ItemError;

use super::metrics::prometheus_enabled;

pub fn catalog_loaded(url: &str, total: usize, verified: usize, elapsed: Duration) {
    info!(
        target: "sweep::discovery",
        event = "catalog_loaded",
        url,
        total,
        verified,
        elapsed_ms = elapsed.as_millis() as u64,
        "代币目录加载完成"
    );
    if prometheus_enabled() {
        histogram!("scoop_catalog_load_ms").record(elapsed.as_secs_f64() * 1_000.0);
    }
}

pub fn discovery_finished(
    owner: &Pubkey,
    enumerated: usize,
    held: usize,
    unknown: usize,
    excluded: usize,
) {
    info!(
        target: "sweep::discovery",
        event = "discovery_finished",
        owner = %owner,
        enumerated,
        held,
        unknown,
        excluded,
        "余额发现完成"
    );
}

pub fn quote_resolved(mint: &Pubkey, in_amount: u64, out_amount: u64) {
    debug!(
        target: "sweep::quote",
        event = "quote_resolved",
        mint = %mint,
        in_amount,
        out_amount,
        "报价成功"
    );
    if prometheus_enabled() {
        counter!("scoop_quote_total", "status" => "success").increment(1);
    }
}

pub fn quote_failed(mint: &Pubkey, error: &ItemError) {
    warn!(
        target: "sweep::quote",
        event = "quote_failed",
        mint = %mint,
        error = %error,
        "报价失败"
    );
    if prometheus_enabled() {
        counter!("scoop_quote_total", "status" => "failed").increment(1);
    }
}

pub fn instructions_built(
    mint: &Pubkey,
    instruction_count: usize,
    lookup_tables: usize,
    compute_unit_limit: Option<u32>,
) {
    debug!(
        target: "sweep::builder",
        event = "instructions_built",
        mint = %mint,
        instruction_count,
        lookup_tables,
        compute_unit_limit = compute_unit_limit.unwrap_or_default(),
        "指令构建完成"
    );
    if prometheus_enabled() {
        counter!("scoop_build_total", "status" => "success").increment(1);
    }
}

pub fn build_failed(mint: &Pubkey, error: &ItemError) {
    warn!(
        target: "sweep::builder",
        event = "build_failed",
        mint = %mint,
        error = %error,
        "指令构建失败"
    );
    if prometheus_enabled() {
        counter!("scoop_build_total", "status" => "failed").increment(1);
    }
}

pub fn batch_assembled(kind: &'static str, transactions: usize, dropped: usize, blockhash: &Hash) {
    info!(
        target: "sweep::builder",
        event = "batch_assembled",
        kind,
        transactions,
        dropped,
        blockhash = %blockhash,
        "批次组装完成"
    );
}

pub fn batch_signed(kind: &'static str, transactions: usize) {
    info!(
        target: "sweep::submission",
        event = "batch_signed",
        kind,
        transactions,
        "批次签名完成"
    );
    if prometheus_enabled() {
        counter!("scoop_batch_total", "kind" => kind, "result" => "signed").increment(1);
    }
}

pub fn batch_rejected(kind: &'static str, transactions: usize, reason: &str) {
    warn!(
        target: "sweep::submission",
        event = "batch_rejected",
        kind,
        transactions,
        reason,
        "批次签名被拒绝，全部交易未提交"
    );
    if prometheus_enabled() {
        counter!("scoop_batch_total", "kind" => kind, "result" => "rejected").increment(1);
    }
}

pub fn submission_landed(kind: &'static str, mint: &Pubkey, signature: &Signature) {
    info!(
        target: "sweep::submission",
        event = "submission_landed",
        kind,
        mint = %mint,
        signature = %signature,
        "交易已确认"
    );
    if prometheus_enabled() {
        counter!("scoop_submission_total", "kind" => kind, "status" => "confirmed").increment(1);
    }
}

pub fn submission_failed(kind: &'static str, mint: &Pubkey, error: &ItemError) {
    warn!(
        target: "sweep::submission",
        event = "submission_failed",
        kind,
        mint = %mint,
        error = %error,
        "交易提交失败"
    );
    if prometheus_enabled() {
        counter!("scoop_submission_total", "kind" => kind, "status" => "failed").increment(1);
    }
}
