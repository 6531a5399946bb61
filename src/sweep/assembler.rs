use std::fmt;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::message::{AddressLookupTableAccount, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::monitoring::events;

use super::types::{InstructionSet, ItemError, LifecycleState};

/// 单笔交易序列化后的上限（字节）。
pub const MAX_TRANSACTION_SIZE: usize = 1_232;

/// 批次类型：兑换或直接转账。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Swap,
    Send,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchKind::Swap => "swap",
            BatchKind::Send => "send",
        }
    }

    /// 签名完成、等待落地时的状态。
    pub fn in_flight_state(self) -> LifecycleState {
        match self {
            BatchKind::Swap => LifecycleState::Swapping,
            BatchKind::Send => LifecycleState::Sending,
        }
    }

    pub fn landed_state(self) -> LifecycleState {
        match self {
            BatchKind::Swap => LifecycleState::Swapped,
            BatchKind::Send => LifecycleState::Sent,
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待编译的单个代币交易。
#[derive(Debug, Clone)]
pub struct PlannedTransaction {
    pub mint: Pubkey,
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
}

impl PlannedTransaction {
    pub fn swap(mint: Pubkey, set: &InstructionSet) -> Self {
        Self {
            mint,
            instructions: set.instructions(),
            lookup_tables: set.lookup_tables().to_vec(),
        }
    }

    /// 转账路径不使用查找表。
    pub fn send(mint: Pubkey, instructions: Vec<Instruction>) -> Self {
        Self {
            mint,
            instructions,
            lookup_tables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub mint: Pubkey,
    pub transaction: VersionedTransaction,
}

/// 一次签名调用所覆盖的全部交易，共享同一个 blockhash。
#[derive(Debug, Clone)]
pub struct SweepBatch {
    pub kind: BatchKind,
    pub blockhash: Hash,
    pub transactions: Vec<AssembledTransaction>,
}

impl SweepBatch {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn mints(&self) -> impl Iterator<Item = Pubkey> + '_ {
        self.transactions.iter().map(|tx| tx.mint)
    }
}

#[derive(Debug)]
pub struct Assembly {
    pub batch: SweepBatch,
    /// 编译失败的代币，记为构建错误。
    pub failures: Vec<(Pubkey, ItemError)>,
    /// 没有任何指令而被跳过的代币。
    pub dropped: Vec<Pubkey>,
}

/// 为每个计划编译一笔未签名的 v0 交易。
pub fn assemble_batch(
    kind: BatchKind,
    payer: &Pubkey,
    blockhash: Hash,
    plans: Vec<PlannedTransaction>,
) -> Assembly {
    let mut transactions = Vec::with_capacity(plans.len());
    let mut failures = Vec::new();
    let mut dropped = Vec::new();

    for plan in plans {
        if plan.instructions.is_empty() {
            debug!(
                target: "sweep::builder",
                mint = %plan.mint,
                kind = kind.as_str(),
                "无指令，跳过"
            );
            dropped.push(plan.mint);
            continue;
        }
        match compile_unsigned(payer, &plan, blockhash) {
            Ok(transaction) => transactions.push(AssembledTransaction {
                mint: plan.mint,
                transaction,
            }),
            Err(err) => failures.push((plan.mint, err)),
        }
    }

    events::batch_assembled(kind.as_str(), transactions.len(), dropped.len(), &blockhash);
    Assembly {
        batch: SweepBatch {
            kind,
            blockhash,
            transactions,
        },
        failures,
        dropped,
    }
}

fn compile_unsigned(
    payer: &Pubkey,
    plan: &PlannedTransaction,
    blockhash: Hash,
) -> Result<VersionedTransaction, ItemError> {
    let message = V0Message::try_compile(payer, &plan.instructions, &plan.lookup_tables, blockhash)
        .map_err(|err| ItemError::build(format!("交易编译失败: {err}")))?;
    let required = usize::from(message.header.num_required_signatures);
    let message = VersionedMessage::V0(message);

    // shortvec 长度前缀在签名数小于 128 时占 1 字节
    let size = 1 + required * 64 + message.serialize().len();
    if size > MAX_TRANSACTION_SIZE {
        return Err(ItemError::build(format!(
            "交易大小 {size} 字节超过上限 {MAX_TRANSACTION_SIZE}"
        )));
    }

    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); required],
        message,
    })
}
