use std::collections::HashSet;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::concurrency::settle_all;
use crate::monitoring::events;

use super::assembler::{BatchKind, SweepBatch};
use super::error::SignerError;
use super::observer::SubmissionObserver;
use super::ports::{BatchSigner, LedgerProvider};
use super::types::{ItemError, LifecycleState};

/// 一个批次提交后的逐项结果。
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub kind: BatchKind,
    pub landed: Vec<(Pubkey, Signature)>,
    pub failed: Vec<(Pubkey, ItemError)>,
}

impl SubmissionReport {
    pub fn empty(kind: BatchKind) -> Self {
        Self {
            kind,
            landed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.landed.len() + self.failed.len()
    }
}

/// 整批签名一次，然后逐笔独立提交并等待确认。
///
/// 签名被拒绝或签名结果不可用时返回 `Err`，此时没有任何交易被提交，也不会触发
/// 状态回调。签名成功后每个代币先收到交易签名与进行中状态，再收到各自的终态。
pub async fn submit_batch(
    ledger: &dyn LedgerProvider,
    signer: &dyn BatchSigner,
    batch: SweepBatch,
    observer: &dyn SubmissionObserver,
    cancel: &CancellationToken,
) -> Result<SubmissionReport, SignerError> {
    let kind = batch.kind;
    if batch.is_empty() {
        debug!(target: "sweep::submission", kind = kind.as_str(), "批次为空，跳过签名");
        return Ok(SubmissionReport::empty(kind));
    }

    let count = batch.len();
    let (mints, unsigned): (Vec<Pubkey>, Vec<VersionedTransaction>) = batch
        .transactions
        .into_iter()
        .map(|item| (item.mint, item.transaction))
        .unzip();

    let signed = match signer.sign_all(unsigned.clone()).await {
        Ok(signed) => signed,
        Err(err) => {
            events::batch_rejected(kind.as_str(), count, &err.to_string());
            return Err(err);
        }
    };
    if let Err(err) = verify_signed(&unsigned, &signed) {
        events::batch_rejected(kind.as_str(), count, &err.to_string());
        return Err(err);
    }
    events::batch_signed(kind.as_str(), count);

    for (mint, tx) in mints.iter().zip(&signed) {
        if let Some(signature) = tx.signatures.first() {
            observer.on_signature(mint, signature);
        }
        observer.on_state(mint, kind.in_flight_state());
    }

    let tasks = mints.iter().copied().zip(signed).map(|(mint, tx)| {
        (mint, async move {
            match ledger.submit_and_confirm(&tx).await {
                Ok(signature) => {
                    events::submission_landed(kind.as_str(), &mint, &signature);
                    observer.on_state(&mint, kind.landed_state());
                    Ok(signature)
                }
                Err(err) => {
                    let err = ItemError::submission(err.to_string());
                    events::submission_failed(kind.as_str(), &mint, &err);
                    observer.on_error(&mint, &err);
                    observer.on_state(&mint, LifecycleState::Error);
                    Err(err)
                }
            }
        })
    });
    let settled = settle_all(tasks, cancel).await;

    let mut report = SubmissionReport {
        kind,
        landed: settled.successes,
        failed: settled.failures,
    };
    if settled.cancelled > 0 {
        let finished: HashSet<Pubkey> = report
            .landed
            .iter()
            .map(|(mint, _)| *mint)
            .chain(report.failed.iter().map(|(mint, _)| *mint))
            .collect();
        for mint in mints.into_iter().filter(|mint| !finished.contains(mint)) {
            let err = ItemError::submission("已取消等待确认，交易结果未知");
            observer.on_error(&mint, &err);
            observer.on_state(&mint, LifecycleState::Error);
            report.failed.push((mint, err));
        }
    }
    Ok(report)
}

fn verify_signed(
    unsigned: &[VersionedTransaction],
    signed: &[VersionedTransaction],
) -> Result<(), SignerError> {
    if signed.len() != unsigned.len() {
        return Err(SignerError::Mismatch {
            expected: unsigned.len(),
            returned: signed.len(),
        });
    }
    for (index, (before, after)) in unsigned.iter().zip(signed).enumerate() {
        if before.message != after.message {
            return Err(SignerError::MessageChanged { index });
        }
    }
    Ok(())
}
