use std::collections::HashMap;
use std::sync::Arc;

use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_sdk::account::Account;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::rpc::LedgerError;
use crate::sweep::ports::LedgerProvider;

use super::{Cache, InMemoryBackend};

/// 会话共享的 ALT 缓存。同一批次内重复引用的查找表只拉取一次。
pub struct AltCache {
    inner: Cache<InMemoryBackend<Pubkey, AddressLookupTableAccount>>,
}

impl Default for AltCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AltCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::new(InMemoryBackend::default()),
        }
    }

    /// 批量解析查找表，结果按地址索引；拉取失败或无法解码的地址不会出现在结果中。
    pub async fn fetch_many(
        &self,
        ledger: &dyn LedgerProvider,
        keys: &[Pubkey],
    ) -> HashMap<Pubkey, Arc<AddressLookupTableAccount>> {
        let mut resolved = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        for key in keys {
            if resolved.contains_key(key) || missing.contains(key) {
                continue;
            }
            match self.inner.get(key).await {
                Some(table) => {
                    resolved.insert(*key, table);
                }
                None => missing.push(*key),
            }
        }

        if missing.is_empty() {
            return resolved;
        }

        debug!(
            target: "cache::alt",
            cached = resolved.len(),
            missing = missing.len(),
            "拉取缺失的 ALT"
        );
        for (key, table) in self.refresh_many(ledger, &missing).await {
            resolved.insert(key, table);
        }
        resolved
    }

    /// 忽略缓存强制拉取。批量请求失败时逐条回退。
    pub async fn refresh_many(
        &self,
        ledger: &dyn LedgerProvider,
        keys: &[Pubkey],
    ) -> Vec<(Pubkey, Arc<AddressLookupTableAccount>)> {
        if keys.is_empty() {
            return Vec::new();
        }

        let mut collected = Vec::with_capacity(keys.len());
        match ledger.get_accounts(keys).await {
            Ok(accounts) => {
                for (address, account) in keys.iter().zip(accounts) {
                    if let Some(table) = self.store(address, account).await {
                        collected.push((*address, table));
                    }
                }
            }
            Err(err) => {
                warn!(
                    target: "cache::alt",
                    error = %err,
                    count = keys.len(),
                    "批量拉取 ALT 失败，尝试逐条回退"
                );
                for address in keys {
                    match ledger.get_accounts(std::slice::from_ref(address)).await {
                        Ok(mut accounts) => {
                            let account = accounts.pop().flatten();
                            if let Some(table) = self.store(address, account).await {
                                collected.push((*address, table));
                            }
                        }
                        Err(fetch_err) => {
                            warn!(
                                target: "cache::alt",
                                address = %address,
                                error = %fetch_err,
                                "逐条拉取 ALT 失败"
                            );
                            self.inner.remove(address).await;
                        }
                    }
                }
            }
        }
        collected
    }

    async fn store(
        &self,
        address: &Pubkey,
        account: Option<Account>,
    ) -> Option<Arc<AddressLookupTableAccount>> {
        let Some(account) = account else {
            warn!(target: "cache::alt", address = %address, "ALT 账户不存在");
            self.inner.remove(address).await;
            return None;
        };
        match deserialize_lookup_table(address, &account) {
            Ok(table) => {
                let table = Arc::new(table);
                self.inner.insert(*address, table.clone()).await;
                Some(table)
            }
            Err(err) => {
                warn!(
                    target: "cache::alt",
                    address = %address,
                    error = %err,
                    "反序列化 ALT 失败，移除缓存"
                );
                self.inner.remove(address).await;
                None
            }
        }
    }
}

pub fn deserialize_lookup_table(
    address: &Pubkey,
    account: &Account,
) -> Result<AddressLookupTableAccount, LedgerError> {
    AddressLookupTable::deserialize(&account.data)
        .map(|table| AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.into_owned(),
        })
        .map_err(|err| LedgerError::Decode {
            address: *address,
            reason: err.to_string(),
        })
}
