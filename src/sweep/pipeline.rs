//! 对外暴露的两个入口：发现并报价、提交清扫。两者都在每个代币落定后才返回。

use std::collections::HashSet;

use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::AltCache;

use super::amount::Percentage;
use super::assembler::{BatchKind, PlannedTransaction, assemble_batch};
use super::builder::build_instruction_sets;
use super::catalog::AssetCatalog;
use super::discovery::{DiscoveryFilter, discover_balances};
use super::error::{SweepError, SweepResult};
use super::observer::{DiscoveryObserver, NoopObserver, SubmissionObserver};
use super::ports::{BatchSigner, LedgerProvider, QuoteService};
use super::quote::{QuotePlan, resolve_quotes};
use super::submission::{SubmissionReport, submit_batch};
use super::transfer::transfer_instructions;
use super::types::{HeldBalance, ItemError, SweepItem};

/// 流水线依赖的外部能力。
#[derive(Clone, Copy)]
pub struct SweepServices<'a> {
    pub ledger: &'a dyn LedgerProvider,
    pub quotes: &'a dyn QuoteService,
    pub signer: &'a dyn BatchSigner,
    pub alt_cache: &'a AltCache,
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryRequest<'a> {
    pub owner: Pubkey,
    pub plan: QuotePlan,
    pub filter: DiscoveryFilter<'a>,
    /// 报价后立即构建指令集，触发 `on_instructions`。
    pub prefetch_instructions: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub balances: Vec<HeldBalance>,
    pub quoted: usize,
    pub failed: usize,
    pub built: usize,
    pub cancelled: usize,
}

/// 发现余额并为每个非零余额报价。
///
/// 只有余额查询失败会返回错误；单个代币的报价或构建失败通过 `on_error` 回调上报。
pub async fn find_quotes(
    services: SweepServices<'_>,
    catalog: &AssetCatalog,
    request: &DiscoveryRequest<'_>,
    observer: &dyn DiscoveryObserver,
    cancel: &CancellationToken,
) -> SweepResult<DiscoveryReport> {
    let balances = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SweepError::Cancelled),
        result = discover_balances(services.ledger, &request.owner, catalog, request.filter) => result?,
    };
    observer.on_balances(&balances);

    let quotes = resolve_quotes(
        services.quotes,
        &balances,
        &request.plan,
        &HashSet::new(),
        observer,
        cancel,
    )
    .await;

    let mut built = 0;
    let mut cancelled = quotes.cancelled;
    if request.prefetch_instructions && !quotes.successes.is_empty() && !cancel.is_cancelled() {
        let builds = build_instruction_sets(
            services.quotes,
            services.ledger,
            services.alt_cache,
            &quotes.successes,
            &request.owner,
            observer,
            cancel,
        )
        .await;
        built = builds.successes.len();
        cancelled += builds.cancelled;
    }

    let report = DiscoveryReport {
        quoted: quotes.successes.len(),
        failed: quotes.failures.len(),
        built,
        cancelled,
        balances,
    };
    info!(
        target: "sweep::quote",
        balances = report.balances.len(),
        quoted = report.quoted,
        failed = report.failed,
        built = report.built,
        "报价阶段完成"
    );
    if cancel.is_cancelled() {
        return Err(SweepError::Cancelled);
    }
    Ok(report)
}

/// 以当前比例与滑点重新报价、构建指令并整批兑换为目标代币。
pub async fn sweep_tokens(
    services: SweepServices<'_>,
    items: &[SweepItem],
    plan: &QuotePlan,
    observer: &dyn SubmissionObserver,
    cancel: &CancellationToken,
) -> SweepResult<SubmissionReport> {
    let user = services.signer.pubkey();
    let balances = selected_balances(items);

    let quotes = resolve_quotes(
        services.quotes,
        &balances,
        plan,
        &HashSet::new(),
        &NoopObserver,
        cancel,
    )
    .await;
    report_failures(observer, &quotes.failures);
    if cancel.is_cancelled() {
        return Err(SweepError::Cancelled);
    }

    let builds = build_instruction_sets(
        services.quotes,
        services.ledger,
        services.alt_cache,
        &quotes.successes,
        &user,
        &NoopObserver,
        cancel,
    )
    .await;
    report_failures(observer, &builds.failures);
    if cancel.is_cancelled() {
        return Err(SweepError::Cancelled);
    }

    let plans = builds
        .successes
        .iter()
        .map(|(mint, set)| PlannedTransaction::swap(*mint, set))
        .collect();
    let mut preflight = quotes.failures;
    preflight.extend(builds.failures);
    submit(services, BatchKind::Swap, plans, preflight, observer, cancel).await
}

/// 把选中的代币按比例直接转给 `destination`。
pub async fn send_tokens(
    services: SweepServices<'_>,
    items: &[SweepItem],
    destination: &Pubkey,
    percentage: Percentage,
    observer: &dyn SubmissionObserver,
    cancel: &CancellationToken,
) -> SweepResult<SubmissionReport> {
    let payer = services.signer.pubkey();
    let plans = selected_balances(items)
        .iter()
        .map(|balance| {
            let amount = percentage.apply(balance.raw_amount);
            PlannedTransaction::send(
                balance.mint(),
                transfer_instructions(&payer, balance, destination, amount),
            )
        })
        .collect();
    submit(services, BatchKind::Send, plans, Vec::new(), observer, cancel).await
}

async fn submit(
    services: SweepServices<'_>,
    kind: BatchKind,
    plans: Vec<PlannedTransaction>,
    preflight_failures: Vec<(Pubkey, ItemError)>,
    observer: &dyn SubmissionObserver,
    cancel: &CancellationToken,
) -> SweepResult<SubmissionReport> {
    let blockhash = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SweepError::Cancelled),
        result = services.ledger.latest_blockhash() => result?,
    };
    let assembly = assemble_batch(kind, &services.signer.pubkey(), blockhash, plans);
    report_failures(observer, &assembly.failures);

    let mut report = submit_batch(
        services.ledger,
        services.signer,
        assembly.batch,
        observer,
        cancel,
    )
    .await?;
    info!(
        target: "sweep::submission",
        kind = kind.as_str(),
        landed = report.landed.len(),
        failed = report.failed.len(),
        skipped = preflight_failures.len() + assembly.failures.len(),
        "批次提交完成"
    );
    report.failed.extend(preflight_failures);
    report.failed.extend(assembly.failures);
    Ok(report)
}

fn selected_balances(items: &[SweepItem]) -> Vec<HeldBalance> {
    items
        .iter()
        .filter(|item| item.included && item.can_include())
        .map(|item| item.balance.clone())
        .collect()
}

fn report_failures(observer: &dyn SubmissionObserver, failures: &[(Pubkey, ItemError)]) {
    for (mint, err) in failures {
        observer.on_error(mint, err);
    }
}
