use std::sync::Arc;
use std::time::{Duration, Instant};

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info, warn};

use crate::config::{LanderConfig, TimeoutConfig};

use super::LanderReceipt;
use super::error::LanderError;

/// 解析 `processed` / `confirmed` / `finalized`。
pub fn parse_commitment(raw: &str) -> Result<CommitmentConfig, LanderError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(LanderError::fatal(format!("未知的 commitment 级别: {other}"))),
    }
}

#[derive(Clone)]
pub struct RpcLander {
    client: Arc<RpcClient>,
    config: RpcSendTransactionConfig,
    commitment: CommitmentConfig,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcLander {
    pub fn new(
        client: Arc<RpcClient>,
        lander: &LanderConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, LanderError> {
        let commitment = parse_commitment(&lander.commitment)?;
        let config = RpcSendTransactionConfig {
            skip_preflight: lander.skip_preflight,
            preflight_commitment: Some(commitment.commitment),
            max_retries: lander.max_retries,
            ..RpcSendTransactionConfig::default()
        };
        Ok(Self {
            client,
            config,
            commitment,
            confirm_timeout: Duration::from_millis(timeouts.confirm_ms),
            poll_interval: Duration::from_millis(timeouts.confirm_poll_ms.max(1)),
        })
    }

    pub async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, LanderError> {
        let signature = self
            .client
            .send_transaction_with_config(tx, self.config.clone())
            .await?;
        info!(
            target: "lander::rpc",
            signature = %signature,
            blockhash = %tx.message.recent_blockhash(),
            skip_preflight = self.config.skip_preflight,
            max_retries = ?self.config.max_retries,
            "transaction submitted via rpc client"
        );
        Ok(signature)
    }

    /// 轮询签名状态直到确认、链上失败或超时。
    pub async fn confirm(&self, signature: &Signature) -> Result<(), LanderError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self
                .client
                .get_signature_status_with_commitment(signature, self.commitment)
                .await
            {
                Ok(Some(Ok(()))) => return Ok(()),
                Ok(Some(Err(err))) => {
                    return Err(LanderError::TransactionFailed {
                        signature: *signature,
                        reason: err.to_string(),
                    });
                }
                Ok(None) => {
                    debug!(target: "lander::rpc", signature = %signature, "交易尚未确认");
                }
                Err(err) => {
                    warn!(
                        target: "lander::rpc",
                        signature = %signature,
                        error = %err,
                        "查询签名状态失败，稍后重试"
                    );
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(LanderError::ConfirmTimeout {
                    signature: *signature,
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn submit_and_confirm(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<LanderReceipt, LanderError> {
        let started = Instant::now();
        let signature = self.submit(tx).await?;
        self.confirm(&signature).await?;
        let confirm_ms = started.elapsed().as_millis() as u64;
        info!(
            target: "lander::rpc",
            signature = %signature,
            confirm_ms,
            "transaction confirmed"
        );
        Ok(LanderReceipt {
            lander: "rpc",
            endpoint: self.client.url().to_string(),
            signature,
            confirm_ms,
        })
    }
}
