//! 进程内的协作方替身，供单元测试与场景测试使用。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose};
use reqwest::StatusCode;
use serde_json::json;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::api::catalog::CatalogError;
use crate::api::jupiter::JupiterError;
use crate::api::jupiter::swap_instructions::{
    AccountPayload, InstructionPayload, SwapInstructionsResponse,
};
use crate::cache::alt::tests::lookup_table_account;
use crate::rpc::LedgerError;

use super::error::SignerError;
use super::observer::{DiscoveryObserver, SubmissionObserver};
use super::ports::{
    AssetCatalogSource, BatchSigner, LedgerProvider, QuoteQuery, QuoteService, TokenAccountRecord,
};
use super::types::{
    AssetCatalogEntry, HeldBalance, InstructionSet, ItemError, LifecycleState, QuoteResult,
    TokenProgramKind,
};

pub fn catalog_entry(address: Pubkey, symbol: &str, decimals: u8, verified: bool) -> AssetCatalogEntry {
    AssetCatalogEntry {
        address,
        decimals,
        symbol: symbol.to_string(),
        name: format!("{symbol} token"),
        logo_uri: None,
        tags: if verified {
            vec!["verified".to_string()]
        } else {
            Vec::new()
        },
    }
}

pub fn held_balance(symbol: &str, decimals: u8, raw_amount: u64) -> HeldBalance {
    HeldBalance {
        asset: Arc::new(catalog_entry(Pubkey::new_unique(), symbol, decimals, true)),
        account: Pubkey::new_unique(),
        raw_amount,
        program: TokenProgramKind::Legacy,
    }
}

pub fn quote_for(balance: &HeldBalance, target: &Pubkey, input_amount: u64) -> QuoteResult {
    QuoteResult {
        input_mint: balance.mint(),
        output_mint: *target,
        input_amount,
        output_amount: input_amount / 2,
        min_output_amount: input_amount / 2,
        slippage_bps: 50,
        price_impact_pct: Default::default(),
        route: json!({
            "inputMint": balance.mint().to_string(),
            "inAmount": input_amount.to_string(),
        }),
    }
}

#[derive(Default)]
pub struct FakeLedger {
    accounts: Mutex<Vec<(TokenProgramKind, TokenAccountRecord)>>,
    onchain: Mutex<HashMap<Pubkey, Account>>,
    failing_mints: Mutex<HashSet<Pubkey>>,
    submitted: Mutex<Vec<VersionedTransaction>>,
    enumeration_down: Mutex<bool>,
    blockhash: Hash,
    blockhash_calls: AtomicUsize,
    get_accounts_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            ..Self::default()
        }
    }

    pub fn add_token_account(
        &self,
        program: TokenProgramKind,
        owner: &Pubkey,
        mint: Pubkey,
        amount: u64,
    ) -> Pubkey {
        let address = Pubkey::new_unique();
        self.accounts.lock().unwrap().push((
            program,
            TokenAccountRecord {
                address,
                mint,
                owner: *owner,
                amount,
            },
        ));
        address
    }

    /// 修改该 mint 下所有账户的余额。
    pub fn set_balance(&self, mint: Pubkey, amount: u64) {
        for (_, record) in self.accounts.lock().unwrap().iter_mut() {
            if record.mint == mint {
                record.amount = amount;
            }
        }
    }

    pub fn close_accounts(&self, mint: Pubkey) {
        self.accounts
            .lock()
            .unwrap()
            .retain(|(_, record)| record.mint != mint);
    }

    pub fn add_lookup_table(&self, address: Pubkey, entries: &[Pubkey]) {
        self.onchain
            .lock()
            .unwrap()
            .insert(address, lookup_table_account(entries));
    }

    pub fn fail_enumeration(&self) {
        *self.enumeration_down.lock().unwrap() = true;
    }

    /// 引用该 mint 的交易提交时失败。
    pub fn fail_submission_for(&self, mint: Pubkey) {
        self.failing_mints.lock().unwrap().insert(mint);
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn get_accounts_calls(&self) -> usize {
        self.get_accounts_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerProvider for FakeLedger {
    async fn enumerate_token_accounts(
        &self,
        owner: &Pubkey,
        program: TokenProgramKind,
    ) -> Result<Vec<TokenAccountRecord>, LedgerError> {
        if *self.enumeration_down.lock().unwrap() {
            return Err(LedgerError::Unavailable("rpc down".to_string()));
        }
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, record)| *kind == program && record.owner == *owner)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blockhash)
    }

    async fn get_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, LedgerError> {
        self.get_accounts_calls.fetch_add(1, Ordering::SeqCst);
        let onchain = self.onchain.lock().unwrap();
        Ok(addresses
            .iter()
            .map(|address| onchain.get(address).cloned())
            .collect())
    }

    async fn submit_and_confirm(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, LedgerError> {
        self.submitted.lock().unwrap().push(transaction.clone());
        let failing = self.failing_mints.lock().unwrap();
        if transaction
            .message
            .static_account_keys()
            .iter()
            .any(|key| failing.contains(key))
        {
            return Err(LedgerError::Unavailable("blockhash not found".to_string()));
        }
        Ok(transaction.signatures[0])
    }
}

/// 报价输出为输入的一半；指令集中的兑换指令引用输入 mint。
#[derive(Default)]
pub struct FakeQuoteService {
    failing_quotes: Mutex<HashSet<Pubkey>>,
    failing_builds: Mutex<HashSet<Pubkey>>,
    lookup_tables: Mutex<HashMap<Pubkey, Vec<Pubkey>>>,
    quote_calls: Mutex<Vec<(Pubkey, u64)>>,
    swap_calls: AtomicUsize,
}

impl FakeQuoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_quote(&self, mint: Pubkey) {
        self.failing_quotes.lock().unwrap().insert(mint);
    }

    /// 返回无法解码的指令数据。
    pub fn fail_build(&self, mint: Pubkey) {
        self.failing_builds.lock().unwrap().insert(mint);
    }

    pub fn use_lookup_tables(&self, mint: Pubkey, tables: Vec<Pubkey>) {
        self.lookup_tables.lock().unwrap().insert(mint, tables);
    }

    /// 按 mint 排序的报价请求。
    pub fn quote_calls(&self) -> Vec<(Pubkey, u64)> {
        let mut calls = self.quote_calls.lock().unwrap().clone();
        calls.sort_by_key(|(mint, _)| mint.to_bytes());
        calls
    }

    pub fn swap_calls(&self) -> usize {
        self.swap_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteService for FakeQuoteService {
    async fn quote(&self, query: &QuoteQuery) -> Result<QuoteResult, JupiterError> {
        self.quote_calls
            .lock()
            .unwrap()
            .push((query.input_mint, query.amount));
        tokio::task::yield_now().await;
        if self.failing_quotes.lock().unwrap().contains(&query.input_mint) {
            return Err(JupiterError::ApiStatus {
                endpoint: "quote".to_string(),
                status: StatusCode::BAD_REQUEST,
                body: "COULD_NOT_FIND_ANY_ROUTE".to_string(),
            });
        }
        Ok(QuoteResult {
            input_mint: query.input_mint,
            output_mint: query.output_mint,
            input_amount: query.amount,
            output_amount: query.amount / 2,
            min_output_amount: query.amount / 2,
            slippage_bps: query.slippage_bps,
            price_impact_pct: Default::default(),
            route: json!({ "inAmount": query.amount.to_string() }),
        })
    }

    async fn swap_instructions(
        &self,
        quote: &QuoteResult,
        user: &Pubkey,
    ) -> Result<SwapInstructionsResponse, JupiterError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let data = if self.failing_builds.lock().unwrap().contains(&quote.input_mint) {
            "not base64!".to_string()
        } else {
            let mut bytes = vec![0xE5];
            bytes.extend_from_slice(&quote.input_amount.to_le_bytes());
            general_purpose::STANDARD.encode(bytes)
        };
        let tables = self
            .lookup_tables
            .lock()
            .unwrap()
            .get(&quote.input_mint)
            .cloned()
            .unwrap_or_default();
        Ok(SwapInstructionsResponse {
            compute_budget_instructions: Vec::new(),
            setup_instructions: Vec::new(),
            swap_instruction: InstructionPayload {
                program_id: "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4".to_string(),
                accounts: vec![
                    AccountPayload {
                        pubkey: user.to_string(),
                        is_signer: true,
                        is_writable: true,
                    },
                    AccountPayload {
                        pubkey: quote.input_mint.to_string(),
                        is_signer: false,
                        is_writable: false,
                    },
                ],
                data,
            },
            cleanup_instruction: None,
            address_lookup_table_addresses: tables.iter().map(ToString::to_string).collect(),
            compute_unit_limit: None,
            prioritization_fee_lamports: None,
        })
    }
}

pub struct FakeSigner {
    keypair: Keypair,
    approve: bool,
    calls: AtomicUsize,
}

impl FakeSigner {
    pub fn approving() -> Self {
        Self {
            keypair: Keypair::new(),
            approve: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            approve: false,
            ..Self::approving()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSigner for FakeSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.approve {
            return Err(SignerError::UserRejected);
        }
        transactions
            .into_iter()
            .map(|tx| {
                VersionedTransaction::try_new(tx.message, &[&self.keypair])
                    .map_err(|err| SignerError::Signing(err.to_string()))
            })
            .collect()
    }
}

pub struct FakeCatalog {
    entries: Vec<AssetCatalogEntry>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(entries: Vec<AssetCatalogEntry>) -> Self {
        Self {
            entries,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetCatalogSource for FakeCatalog {
    async fn fetch_all(&self) -> Result<Vec<AssetCatalogEntry>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Asset(Pubkey),
    Quote(Pubkey),
    Instructions(Pubkey),
    Error(Pubkey, ItemError),
    State(Pubkey, LifecycleState),
    Signature(Pubkey, Signature),
}

impl Recorded {
    fn mint(&self) -> &Pubkey {
        match self {
            Recorded::Asset(mint)
            | Recorded::Quote(mint)
            | Recorded::Instructions(mint)
            | Recorded::Error(mint, _)
            | Recorded::State(mint, _)
            | Recorded::Signature(mint, _) => mint,
        }
    }
}

/// 按到达顺序记录所有回调。
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn mentions(&self, mint: &Pubkey) -> bool {
        self.events().iter().any(|event| event.mint() == mint)
    }

    pub fn assets(&self) -> Vec<Pubkey> {
        self.collect(|event| match event {
            Recorded::Asset(mint) => Some(*mint),
            _ => None,
        })
    }

    pub fn quotes(&self) -> Vec<Pubkey> {
        self.collect(|event| match event {
            Recorded::Quote(mint) => Some(*mint),
            _ => None,
        })
    }

    pub fn instructions(&self) -> Vec<Pubkey> {
        self.collect(|event| match event {
            Recorded::Instructions(mint) => Some(*mint),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<(Pubkey, ItemError)> {
        self.collect(|event| match event {
            Recorded::Error(mint, err) => Some((*mint, err.clone())),
            _ => None,
        })
    }

    pub fn states(&self) -> Vec<(Pubkey, LifecycleState)> {
        self.collect(|event| match event {
            Recorded::State(mint, state) => Some((*mint, *state)),
            _ => None,
        })
    }

    pub fn states_for(&self, mint: &Pubkey) -> Vec<LifecycleState> {
        self.states()
            .into_iter()
            .filter(|(m, _)| m == mint)
            .map(|(_, state)| state)
            .collect()
    }

    fn collect<T>(&self, pick: impl Fn(&Recorded) -> Option<T>) -> Vec<T> {
        self.events.lock().unwrap().iter().filter_map(pick).collect()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl DiscoveryObserver for RecordingObserver {
    fn on_asset(&self, balance: &HeldBalance) {
        self.push(Recorded::Asset(balance.mint()));
    }

    fn on_quote(&self, mint: &Pubkey, _quote: &QuoteResult) {
        self.push(Recorded::Quote(*mint));
    }

    fn on_instructions(&self, mint: &Pubkey, _instructions: &Arc<InstructionSet>) {
        self.push(Recorded::Instructions(*mint));
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.push(Recorded::Error(*mint, error.clone()));
    }
}

impl SubmissionObserver for RecordingObserver {
    fn on_state(&self, mint: &Pubkey, state: LifecycleState) {
        self.push(Recorded::State(*mint, state));
    }

    fn on_signature(&self, mint: &Pubkey, signature: &Signature) {
        self.push(Recorded::Signature(*mint, *signature));
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.push(Recorded::Error(*mint, error.clone()));
    }
}
