use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::api::jupiter::swap_instructions::parse_compute_budget_limit;
use crate::api::serde_helpers::{field_as_string, null_as_default};

/// 旧版 Token 程序账户的租金押金（lamports），关闭账户后可回收。
pub const LEGACY_RENT_RECLAIM_LAMPORTS: u64 = 2_400_000;

const VERIFIED_TAG: &str = "verified";

/// 代币目录中的一条记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssetCatalogEntry {
    #[serde(with = "field_as_string")]
    pub address: Pubkey,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
    #[serde(default, rename = "logoURI")]
    pub logo_uri: Option<String>,
    #[serde(default, deserialize_with = "null_as_default::deserialize")]
    pub tags: Vec<String>,
}

impl AssetCatalogEntry {
    pub fn is_verified(&self) -> bool {
        self.tags.iter().any(|tag| tag == VERIFIED_TAG)
    }
}

/// 代币账户所属的程序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenProgramKind {
    Legacy,
    Token2022,
}

impl TokenProgramKind {
    pub const ALL: [TokenProgramKind; 2] = [TokenProgramKind::Legacy, TokenProgramKind::Token2022];

    pub fn program_id(self) -> Pubkey {
        match self {
            TokenProgramKind::Legacy => Pubkey::new_from_array(spl_token::ID.to_bytes()),
            TokenProgramKind::Token2022 => Pubkey::new_from_array(spl_token_2022::ID.to_bytes()),
        }
    }

    /// 关闭账户可回收的租金估算，仅用于展示。
    pub fn rent_reclaim_lamports(self) -> u64 {
        match self {
            TokenProgramKind::Legacy => LEGACY_RENT_RECLAIM_LAMPORTS,
            TokenProgramKind::Token2022 => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenProgramKind::Legacy => "token",
            TokenProgramKind::Token2022 => "token-2022",
        }
    }
}

impl fmt::Display for TokenProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 钱包在某个代币上的持仓。
#[derive(Debug, Clone)]
pub struct HeldBalance {
    pub asset: Arc<AssetCatalogEntry>,
    /// 持仓所在的代币账户。
    pub account: Pubkey,
    pub raw_amount: u64,
    pub program: TokenProgramKind,
}

impl HeldBalance {
    pub fn mint(&self) -> Pubkey {
        self.asset.address
    }

    /// 按小数位换算后的展示数量。
    pub fn ui_amount(&self) -> Decimal {
        ui_amount(self.raw_amount, self.asset.decimals)
    }
}

/// `raw / 10^decimals`，超出 `Decimal` 精度时退化为截断表示。
pub fn ui_amount(raw: u64, decimals: u8) -> Decimal {
    let scale = u32::from(decimals).min(28);
    Decimal::from_i128_with_scale(i128::from(raw), scale)
}

/// 报价服务返回的结果，`route` 为原样保留的报价载荷，构建指令时回传给服务。
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResult {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub input_amount: u64,
    pub output_amount: u64,
    /// 滑点保护下的最小到账数量。
    pub min_output_amount: u64,
    pub slippage_bps: u16,
    pub price_impact_pct: Decimal,
    pub route: Value,
}

/// 按角色标记的指令，顺序固定为 compute budget → setup → primary。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggedInstruction<'a> {
    ComputeBudget(&'a Instruction),
    Setup(&'a Instruction),
    Primary(&'a Instruction),
}

impl<'a> TaggedInstruction<'a> {
    pub fn instruction(self) -> &'a Instruction {
        match self {
            TaggedInstruction::ComputeBudget(ix)
            | TaggedInstruction::Setup(ix)
            | TaggedInstruction::Primary(ix) => ix,
        }
    }
}

/// 单个代币交易所需的全部指令及其地址查找表。
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionSet {
    compute_budget: Vec<Instruction>,
    setup: Vec<Instruction>,
    primary: Instruction,
    lookup_table_addresses: Vec<Pubkey>,
    lookup_tables: Vec<AddressLookupTableAccount>,
}

impl InstructionSet {
    pub fn new(
        compute_budget: Vec<Instruction>,
        setup: Vec<Instruction>,
        primary: Instruction,
        lookup_table_addresses: Vec<Pubkey>,
    ) -> Self {
        Self {
            compute_budget,
            setup,
            primary,
            lookup_table_addresses,
            lookup_tables: Vec::new(),
        }
    }

    pub fn steps(&self) -> impl Iterator<Item = TaggedInstruction<'_>> {
        self.compute_budget
            .iter()
            .map(TaggedInstruction::ComputeBudget)
            .chain(self.setup.iter().map(TaggedInstruction::Setup))
            .chain(std::iter::once(TaggedInstruction::Primary(&self.primary)))
    }

    pub fn primary(&self) -> &Instruction {
        &self.primary
    }

    /// 按固定顺序展开的原生指令。
    pub fn instructions(&self) -> Vec<Instruction> {
        self.steps().map(|step| step.instruction().clone()).collect()
    }

    pub fn instruction_count(&self) -> usize {
        self.compute_budget.len() + self.setup.len() + 1
    }

    /// ComputeBudget 步骤中声明的 compute unit 上限。
    pub fn compute_unit_limit(&self) -> Option<u32> {
        self.compute_budget.iter().find_map(parse_compute_budget_limit)
    }

    pub fn lookup_table_addresses(&self) -> &[Pubkey] {
        &self.lookup_table_addresses
    }

    pub fn lookup_tables(&self) -> &[AddressLookupTableAccount] {
        &self.lookup_tables
    }

    pub fn with_lookup_tables(mut self, tables: Vec<AddressLookupTableAccount>) -> Self {
        self.lookup_tables = tables;
        self
    }
}

/// 报价阶段的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteStatus {
    Pending,
    Quoted(QuoteResult),
    NoQuote(String),
}

/// 指令构建阶段的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStatus {
    Pending,
    Ready(Arc<InstructionSet>),
    NoRoute(String),
}

/// 单个代币在一次清扫中的生命周期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Quoting,
    Quoted,
    Swapping,
    Sending,
    Swapped,
    Sent,
    Error,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Quoting => "quoting",
            LifecycleState::Quoted => "quoted",
            LifecycleState::Swapping => "swapping",
            LifecycleState::Sending => "sending",
            LifecycleState::Swapped => "swapped",
            LifecycleState::Sent => "sent",
            LifecycleState::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Swapped | LifecycleState::Sent | LifecycleState::Error
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 出错的流水线阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Quote,
    Build,
    Submission,
}

impl ErrorStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorStage::Quote => "quote",
            ErrorStage::Build => "build",
            ErrorStage::Submission => "submission",
        }
    }
}

/// 单个代币上的失败记录，不会影响同批次的其他代币。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub stage: ErrorStage,
    pub message: String,
}

impl ItemError {
    pub fn new(stage: ErrorStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn quote(message: impl Into<String>) -> Self {
        Self::new(ErrorStage::Quote, message)
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::new(ErrorStage::Build, message)
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::new(ErrorStage::Submission, message)
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage.as_str(), self.message)
    }
}

/// 报价与构建结果的汇总视图，便于列表展示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Pending,
    Quoted,
    NoQuote,
    NoRoute,
    Failed,
}

/// 清扫清单中的一项，以 mint 地址为键。
#[derive(Debug, Clone)]
pub struct SweepItem {
    pub balance: HeldBalance,
    pub quote: QuoteStatus,
    pub route: RouteStatus,
    pub included: bool,
    pub state: LifecycleState,
    pub last_error: Option<ItemError>,
    pub signature: Option<Signature>,
}

impl SweepItem {
    pub fn new(balance: HeldBalance) -> Self {
        let included = balance.raw_amount > 0;
        Self {
            balance,
            quote: QuoteStatus::Pending,
            route: RouteStatus::Pending,
            included,
            state: LifecycleState::Pending,
            last_error: None,
            signature: None,
        }
    }

    pub fn mint(&self) -> Pubkey {
        self.balance.mint()
    }

    pub fn quote_result(&self) -> Option<&QuoteResult> {
        match &self.quote {
            QuoteStatus::Quoted(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn resolution(&self) -> Resolution {
        if self.state == LifecycleState::Error {
            return Resolution::Failed;
        }
        match (&self.quote, &self.route) {
            (_, RouteStatus::NoRoute(_)) => Resolution::NoRoute,
            (QuoteStatus::NoQuote(_), _) => Resolution::NoQuote,
            (QuoteStatus::Quoted(_), _) => Resolution::Quoted,
            (QuoteStatus::Pending, _) => Resolution::Pending,
        }
    }

    /// 只有余额非零的代币才能被选入批次。
    pub fn can_include(&self) -> bool {
        self.balance.raw_amount > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entry_accepts_null_tags_and_logo() {
        let raw = r#"{
            "address": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "decimals": 6,
            "symbol": "USDC",
            "name": "USD Coin",
            "logoURI": null,
            "tags": null
        }"#;
        let entry: AssetCatalogEntry = serde_json::from_str(raw).expect("entry");
        assert_eq!(entry.decimals, 6);
        assert!(entry.tags.is_empty());
        assert!(entry.logo_uri.is_none());
        assert!(!entry.is_verified());
    }

    #[test]
    fn verified_tag_is_detected() {
        let raw = r#"{
            "address": "So11111111111111111111111111111111111111112",
            "decimals": 9,
            "symbol": "SOL",
            "name": "Wrapped SOL",
            "tags": ["verified", "community"]
        }"#;
        let entry: AssetCatalogEntry = serde_json::from_str(raw).expect("entry");
        assert!(entry.is_verified());
    }

    #[test]
    fn instruction_set_keeps_role_order() {
        let program = Pubkey::new_unique();
        let ix = |tag: u8| Instruction {
            program_id: program,
            accounts: Vec::new(),
            data: vec![tag],
        };
        let set = InstructionSet::new(vec![ix(0), ix(1)], vec![ix(2)], ix(3), Vec::new());
        let data: Vec<u8> = set.instructions().iter().map(|ix| ix.data[0]).collect();
        assert_eq!(data, vec![0, 1, 2, 3]);
        assert_eq!(set.primary().data, vec![3]);
    }

    #[test]
    fn ui_amount_respects_decimals() {
        assert_eq!(ui_amount(1_500_000, 6).to_string(), "1.500000");
        assert_eq!(ui_amount(42, 0).to_string(), "42");
    }

    #[test]
    fn rent_hint_depends_on_program() {
        assert_eq!(
            TokenProgramKind::Legacy.rent_reclaim_lamports(),
            LEGACY_RENT_RECLAIM_LAMPORTS
        );
        assert_eq!(TokenProgramKind::Token2022.rent_reclaim_lamports(), 0);
    }
}
