use std::collections::{BTreeMap, HashSet};

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::monitoring::events;
use crate::rpc::LedgerError;

use super::catalog::AssetCatalog;
use super::ports::{LedgerProvider, TokenAccountRecord};
use super::types::{HeldBalance, TokenProgramKind};

/// 不参与清扫的代币符号，按原样大小写匹配。
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    symbols: HashSet<String>,
}

impl ExclusionList {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryFilter<'a> {
    pub exclusions: Option<&'a ExclusionList>,
    pub verified_only: bool,
}

/// 列出 `owner` 在两个代币程序下的持仓。
///
/// 目录外的代币、排除列表中的代币以及（开启时）未验证代币都会被跳过；同一 mint 存在
/// 多个账户时保留余额最大的一个。结果按 mint 排序，包含零余额持仓。
pub async fn discover_balances(
    ledger: &dyn LedgerProvider,
    owner: &Pubkey,
    catalog: &AssetCatalog,
    filter: DiscoveryFilter<'_>,
) -> Result<Vec<HeldBalance>, LedgerError> {
    let (legacy, token_2022) = tokio::try_join!(
        ledger.enumerate_token_accounts(owner, TokenProgramKind::Legacy),
        ledger.enumerate_token_accounts(owner, TokenProgramKind::Token2022),
    )?;
    let enumerated = legacy.len() + token_2022.len();

    let mut unknown = 0usize;
    let mut excluded = 0usize;
    let mut held: BTreeMap<Pubkey, HeldBalance> = BTreeMap::new();
    let records = legacy
        .into_iter()
        .map(|record| (record, TokenProgramKind::Legacy))
        .chain(
            token_2022
                .into_iter()
                .map(|record| (record, TokenProgramKind::Token2022)),
        );

    for (record, program) in records {
        let TokenAccountRecord {
            address,
            mint,
            amount,
            ..
        } = record;
        let Some(asset) = catalog.get(&mint) else {
            unknown += 1;
            continue;
        };
        let is_excluded = filter
            .exclusions
            .is_some_and(|list| list.contains(&asset.symbol));
        if is_excluded || (filter.verified_only && !asset.is_verified()) {
            excluded += 1;
            continue;
        }

        let candidate = HeldBalance {
            asset: asset.clone(),
            account: address,
            raw_amount: amount,
            program,
        };
        match held.get(&mint) {
            Some(existing) if existing.raw_amount >= candidate.raw_amount => {
                debug!(
                    target: "sweep::discovery",
                    mint = %mint,
                    account = %address,
                    "同一 mint 存在多个账户，保留余额较大的账户"
                );
            }
            _ => {
                held.insert(mint, candidate);
            }
        }
    }

    events::discovery_finished(owner, enumerated, held.len(), unknown, excluded);
    Ok(held.into_values().collect())
}
