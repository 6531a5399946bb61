//! Solana RPC 账本实现。

mod ledger;

use solana_client::client_error::ClientError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::lander::LanderError;

pub use ledger::{RpcLedger, TOKEN_ACCOUNT_LEN, decode_token_account};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("账户 {address} 解码失败: {reason}")]
    Decode { address: Pubkey, reason: String },
    #[error("交易落地失败: {0}")]
    Lander(#[from] LanderError),
    #[error("{0}")]
    Unavailable(String),
}
