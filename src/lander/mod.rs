//! 交易落地：提交已签名交易并轮询确认。

pub mod error;
mod rpc;

use solana_sdk::signature::Signature;

pub use error::LanderError;
pub use rpc::{RpcLander, parse_commitment};

/// 一笔交易的落地结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanderReceipt {
    pub lander: &'static str,
    pub endpoint: String,
    pub signature: Signature,
    pub confirm_ms: u64,
}
