use std::fmt;

use solana_client::client_error::ClientError;
use solana_sdk::signature::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LanderError {
    #[error("RPC 提交失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("交易 {signature} 在 {timeout_ms}ms 内未确认")]
    ConfirmTimeout { signature: Signature, timeout_ms: u64 },
    #[error("交易 {signature} 执行失败: {reason}")]
    TransactionFailed { signature: Signature, reason: String },
    #[error("{0}")]
    Fatal(String),
}

impl LanderError {
    pub fn fatal(reason: impl fmt::Display) -> Self {
        Self::Fatal(reason.to_string())
    }
}
