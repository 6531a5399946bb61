use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use solana_sdk::pubkey::Pubkey;

use crate::api::catalog::CatalogError;
use crate::monitoring::events;

use super::ports::AssetCatalogSource;
use super::types::AssetCatalogEntry;

/// 会话级代币目录，按 mint 索引，加载后只读。
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    entries: HashMap<Pubkey, Arc<AssetCatalogEntry>>,
}

impl AssetCatalog {
    /// 重复地址保留第一次出现的记录。
    pub fn from_entries(entries: impl IntoIterator<Item = AssetCatalogEntry>) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            map.entry(entry.address).or_insert_with(|| Arc::new(entry));
        }
        Self { entries: map }
    }

    pub async fn load(source: &dyn AssetCatalogSource, label: &str) -> Result<Self, CatalogError> {
        let started = Instant::now();
        let catalog = Self::from_entries(source.fetch_all().await?);
        events::catalog_loaded(
            label,
            catalog.len(),
            catalog.verified_count(),
            started.elapsed(),
        );
        Ok(catalog)
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&Arc<AssetCatalogEntry>> {
        self.entries.get(mint)
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.entries.contains_key(mint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verified_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_verified()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AssetCatalogEntry>> {
        self.entries.values()
    }

    /// 仅保留带 `verified` 标签的记录。
    pub fn verified_only(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_verified())
                .map(|(mint, entry)| (*mint, entry.clone()))
                .collect(),
        }
    }

    pub fn find_symbol(&self, symbol: &str) -> Option<&Arc<AssetCatalogEntry>> {
        self.entries
            .values()
            .find(|entry| entry.symbol.eq_ignore_ascii_case(symbol))
    }
}
