use std::sync::Arc;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use tracing::{debug, warn};

use crate::lander::RpcLander;
use crate::sweep::ports::{LedgerProvider, TokenAccountRecord};
use crate::sweep::types::TokenProgramKind;

use super::LedgerError;

/// 代币账户基础布局长度，Token-2022 账户在其后追加扩展数据。
pub const TOKEN_ACCOUNT_LEN: usize = spl_token::state::Account::LEN;
const OWNER_OFFSET: usize = 32;
const MULTIPLE_ACCOUNTS_LIMIT: usize = 100;

/// 基于 Solana JSON-RPC 的账本实现。
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    lander: RpcLander,
}

impl RpcLedger {
    pub fn new(client: Arc<RpcClient>, lander: RpcLander) -> Self {
        Self { client, lander }
    }

    fn owner_filters(owner: &Pubkey, program: TokenProgramKind) -> Vec<RpcFilterType> {
        let mut filters = Vec::with_capacity(2);
        // Token-2022 账户长度不固定，只能按 owner 过滤
        if program == TokenProgramKind::Legacy {
            filters.push(RpcFilterType::DataSize(TOKEN_ACCOUNT_LEN as u64));
        }
        filters.push(RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
            OWNER_OFFSET,
            owner.to_bytes().to_vec(),
        )));
        filters
    }
}

/// 解码代币账户的基础布局，要求账户已初始化。
pub fn decode_token_account(
    address: &Pubkey,
    data: &[u8],
) -> Result<TokenAccountRecord, LedgerError> {
    if data.len() < TOKEN_ACCOUNT_LEN {
        return Err(LedgerError::Decode {
            address: *address,
            reason: format!("数据长度 {} 小于 {TOKEN_ACCOUNT_LEN}", data.len()),
        });
    }
    let state = spl_token::state::Account::unpack(&data[..TOKEN_ACCOUNT_LEN]).map_err(|err| {
        LedgerError::Decode {
            address: *address,
            reason: err.to_string(),
        }
    })?;
    Ok(TokenAccountRecord {
        address: *address,
        mint: Pubkey::new_from_array(state.mint.to_bytes()),
        owner: Pubkey::new_from_array(state.owner.to_bytes()),
        amount: state.amount,
    })
}

#[async_trait]
impl LedgerProvider for RpcLedger {
    async fn enumerate_token_accounts(
        &self,
        owner: &Pubkey,
        program: TokenProgramKind,
    ) -> Result<Vec<TokenAccountRecord>, LedgerError> {
        let config = RpcProgramAccountsConfig {
            filters: Some(Self::owner_filters(owner, program)),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: None,
                commitment: Some(self.client.commitment()),
                min_context_slot: None,
            },
            with_context: Some(false),
            sort_results: None,
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(&program.program_id(), config)
            .await?;

        let mut records = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            match decode_token_account(&address, &account.data) {
                Ok(record) if record.owner == *owner => records.push(record),
                Ok(record) => {
                    debug!(
                        target: "sweep::discovery",
                        account = %address,
                        owner = %record.owner,
                        "代币账户 owner 不匹配，跳过"
                    );
                }
                Err(err) => {
                    warn!(
                        target: "sweep::discovery",
                        account = %address,
                        program = %program,
                        error = %err,
                        "代币账户解码失败，跳过"
                    );
                }
            }
        }
        debug!(
            target: "sweep::discovery",
            owner = %owner,
            program = %program,
            accounts = records.len(),
            "代币账户枚举完成"
        );
        Ok(records)
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn get_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, LedgerError> {
        let mut collected = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MULTIPLE_ACCOUNTS_LIMIT) {
            let accounts = self.client.get_multiple_accounts(chunk).await?;
            collected.extend(accounts);
        }
        Ok(collected)
    }

    async fn submit_and_confirm(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, LedgerError> {
        let receipt = self.lander.submit_and_confirm(transaction).await?;
        Ok(receipt.signature)
    }
}
