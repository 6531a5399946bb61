//! 清扫流水线依赖的外部能力：链上账本、报价服务、批量签名与代币目录。

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::api::catalog::CatalogError;
use crate::api::jupiter::JupiterError;
use crate::api::jupiter::swap_instructions::SwapInstructionsResponse;
use crate::rpc::LedgerError;

use super::error::SignerError;
use super::types::{AssetCatalogEntry, QuoteResult, TokenProgramKind};

/// 枚举出的代币账户（已解码基础布局）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountRecord {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// 列出 `owner` 在指定代币程序下的全部代币账户。
    async fn enumerate_token_accounts(
        &self,
        owner: &Pubkey,
        program: TokenProgramKind,
    ) -> Result<Vec<TokenAccountRecord>, LedgerError>;

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// 按输入顺序返回账户，缺失的账户为 `None`。
    async fn get_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, LedgerError>;

    /// 提交已签名交易并等待确认。
    async fn submit_and_confirm(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, LedgerError>;
}

/// 报价请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteQuery {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn quote(&self, query: &QuoteQuery) -> Result<QuoteResult, JupiterError>;

    /// 请求指令集，返回未解码的原始指令描述。
    async fn swap_instructions(
        &self,
        quote: &QuoteResult,
        user: &Pubkey,
    ) -> Result<SwapInstructionsResponse, JupiterError>;
}

#[async_trait]
pub trait BatchSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// 一次性签署整批交易，返回顺序与输入一致。
    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerError>;
}

#[async_trait]
pub trait AssetCatalogSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<AssetCatalogEntry>, CatalogError>;
}
