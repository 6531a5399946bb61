use std::collections::HashMap;
use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::jupiter::swap_instructions::{InstructionPayload, SwapInstructionsResponse};
use crate::cache::AltCache;
use crate::concurrency::{Settled, settle_all};
use crate::monitoring::events;

use super::observer::DiscoveryObserver;
use super::ports::{LedgerProvider, QuoteService};
use super::types::{InstructionSet, ItemError, QuoteResult};

pub type BuildSettlement = Settled<Pubkey, Arc<InstructionSet>, ItemError>;

/// 把服务端返回的指令描述严格解码为 [`InstructionSet`]，尚未附带查找表。
pub fn decode_instruction_set(
    response: &SwapInstructionsResponse,
) -> Result<InstructionSet, ItemError> {
    let compute_budget = decode_all("compute budget", &response.compute_budget_instructions)?;
    let setup = decode_all("setup", &response.setup_instructions)?;
    let primary = decode_one("swap", &response.swap_instruction)?;
    let lookup_table_addresses = response
        .lookup_table_addresses()
        .map_err(|err| ItemError::build(err.to_string()))?;
    Ok(InstructionSet::new(
        compute_budget,
        setup,
        primary,
        lookup_table_addresses,
    ))
}

fn decode_all(kind: &str, payloads: &[InstructionPayload]) -> Result<Vec<Instruction>, ItemError> {
    payloads
        .iter()
        .map(|payload| decode_one(kind, payload))
        .collect()
}

fn decode_one(kind: &str, payload: &InstructionPayload) -> Result<Instruction, ItemError> {
    payload
        .decode()
        .map_err(|err| ItemError::build(format!("{kind} 指令解码失败: {err}")))
}

/// 请求并解码单个报价的指令集。
pub async fn fetch_instruction_set(
    service: &dyn QuoteService,
    quote: &QuoteResult,
    user: &Pubkey,
) -> Result<InstructionSet, ItemError> {
    let response = service
        .swap_instructions(quote, user)
        .await
        .map_err(|err| ItemError::build(err.describe()))?;
    decode_instruction_set(&response)
}

/// 并发构建一批报价的指令集，再一次性解析全批次引用的查找表。
///
/// 每张查找表在整批内只拉取一次；任一引用的查找表缺失时该代币记为构建失败。
pub async fn build_instruction_sets(
    service: &dyn QuoteService,
    ledger: &dyn LedgerProvider,
    alt_cache: &AltCache,
    quotes: &[(Pubkey, QuoteResult)],
    user: &Pubkey,
    observer: &dyn DiscoveryObserver,
    cancel: &CancellationToken,
) -> BuildSettlement {
    let tasks = quotes.iter().map(|(mint, quote)| {
        (*mint, fetch_instruction_set(service, quote, user))
    });
    let fetched = settle_all(tasks, cancel).await;

    let mut wanted: Vec<Pubkey> = Vec::new();
    for (_, set) in &fetched.successes {
        for address in set.lookup_table_addresses() {
            if !wanted.contains(address) {
                wanted.push(*address);
            }
        }
    }
    let tables = if wanted.is_empty() || cancel.is_cancelled() {
        HashMap::new()
    } else {
        alt_cache.fetch_many(ledger, &wanted).await
    };
    debug!(
        target: "sweep::builder",
        instruction_sets = fetched.successes.len(),
        lookup_tables = wanted.len(),
        resolved = tables.len(),
        "查找表解析完成"
    );

    let mut settled = Settled {
        successes: Vec::with_capacity(fetched.successes.len()),
        failures: fetched.failures,
        cancelled: fetched.cancelled,
    };
    for (mint, set) in fetched.successes {
        let mut resolved = Vec::with_capacity(set.lookup_table_addresses().len());
        let mut missing = None;
        for address in set.lookup_table_addresses() {
            match tables.get(address) {
                Some(table) => resolved.push(table.as_ref().clone()),
                None => {
                    missing = Some(*address);
                    break;
                }
            }
        }
        match missing {
            Some(address) => settled
                .failures
                .push((mint, ItemError::build(format!("查找表 {address} 不可用")))),
            None => settled
                .successes
                .push((mint, Arc::new(set.with_lookup_tables(resolved)))),
        }
    }

    for (mint, set) in &settled.successes {
        events::instructions_built(
            mint,
            set.instruction_count(),
            set.lookup_tables().len(),
            set.compute_unit_limit(),
        );
        observer.on_instructions(mint, set);
    }
    for (mint, err) in &settled.failures {
        events::build_failed(mint, err);
        observer.on_error(mint, err);
    }
    settled
}
