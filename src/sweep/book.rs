//! 清扫清单的唯一所有者。
//!
//! 各阶段的回调只发送消息，由单个任务按到达顺序逐条应用到 [`ItemMap`]，
//! 不同代币的更新互不阻塞，也不存在对同一代币的并发写入。

use std::collections::BTreeMap;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::{SweepError, SweepResult};
use super::observer::{DiscoveryObserver, SubmissionObserver};
use super::types::{
    ErrorStage, HeldBalance, InstructionSet, ItemError, LifecycleState, QuoteResult, QuoteStatus,
    RouteStatus, SweepItem,
};

/// 应用到清单上的单条更新。
#[derive(Debug, Clone)]
pub enum BookEvent {
    Balances(Vec<HeldBalance>),
    Asset(HeldBalance),
    Quote(Pubkey, QuoteResult),
    Instructions(Pubkey, Arc<InstructionSet>),
    Error(Pubkey, ItemError),
    State(Pubkey, LifecycleState),
    Signature(Pubkey, Signature),
}

/// 提交前的条目快照，签名被拒绝时整条回滚。
pub type ItemCapture = Vec<SweepItem>;

/// 按 mint 排序的清单本体。
#[derive(Debug, Default)]
pub struct ItemMap {
    items: BTreeMap<Pubkey, SweepItem>,
}

impl ItemMap {
    pub fn apply(&mut self, event: BookEvent) {
        match event {
            BookEvent::Balances(balances) => {
                // 以本次发现结果为准，不再持有的代币直接移除
                let mut next = BTreeMap::new();
                for balance in balances {
                    let mint = balance.mint();
                    let item = match self.items.remove(&mint) {
                        Some(item) => refresh(item, balance),
                        None => SweepItem::new(balance),
                    };
                    next.insert(mint, item);
                }
                self.items = next;
            }
            BookEvent::Asset(balance) => {
                let mint = balance.mint();
                let item = match self.items.remove(&mint) {
                    Some(item) => refresh(item, balance),
                    None => SweepItem::new(balance),
                };
                let item = self.items.entry(mint).or_insert(item);
                if item.can_include() && item.state == LifecycleState::Pending {
                    item.state = LifecycleState::Quoting;
                }
            }
            BookEvent::Quote(mint, quote) => {
                if let Some(item) = self.items.get_mut(&mint) {
                    item.quote = QuoteStatus::Quoted(quote);
                    item.route = RouteStatus::Pending;
                    item.state = LifecycleState::Quoted;
                    item.last_error = None;
                }
            }
            BookEvent::Instructions(mint, set) => {
                if let Some(item) = self.items.get_mut(&mint) {
                    item.route = RouteStatus::Ready(set);
                }
            }
            BookEvent::Error(mint, error) => {
                if let Some(item) = self.items.get_mut(&mint) {
                    match error.stage {
                        ErrorStage::Quote => {
                            item.quote = QuoteStatus::NoQuote(error.message.clone());
                            item.route = RouteStatus::Pending;
                            item.state = LifecycleState::Pending;
                            item.included = false;
                        }
                        ErrorStage::Build => {
                            item.route = RouteStatus::NoRoute(error.message.clone());
                        }
                        ErrorStage::Submission => {
                            item.state = LifecycleState::Error;
                        }
                    }
                    item.last_error = Some(error);
                }
            }
            BookEvent::State(mint, state) => {
                if let Some(item) = self.items.get_mut(&mint) {
                    item.state = state;
                }
            }
            BookEvent::Signature(mint, signature) => {
                if let Some(item) = self.items.get_mut(&mint) {
                    item.signature = Some(signature);
                }
            }
        }
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&SweepItem> {
        self.items.get(mint)
    }

    pub fn snapshot(&self) -> Vec<SweepItem> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 修改勾选状态，余额为零的代币无法被选中。返回实际发生变化的条目数。
    pub fn set_included(&mut self, mint: Option<&Pubkey>, included: bool) -> usize {
        match mint {
            Some(mint) => self
                .items
                .get_mut(mint)
                .map_or(0, |item| toggle(item, included)),
            None => self
                .items
                .values_mut()
                .map(|item| toggle(item, included))
                .sum(),
        }
    }

    pub fn capture_items(&self) -> ItemCapture {
        self.snapshot()
    }

    /// 报价、路由、勾选与状态一并还原。
    pub fn restore_items(&mut self, capture: ItemCapture) {
        for item in capture {
            if let Some(current) = self.items.get_mut(&item.mint()) {
                *current = item;
            }
        }
    }

    /// 每个代币退回到只有余额的初始状态。
    pub fn reset(&mut self) {
        for item in self.items.values_mut() {
            *item = SweepItem::new(item.balance.clone());
        }
    }
}

/// 余额未变时保留原条目；变化后旧报价作废，勾选仅在仍有余额时保留。
fn refresh(item: SweepItem, balance: HeldBalance) -> SweepItem {
    if item.balance.raw_amount == balance.raw_amount && item.balance.account == balance.account {
        return SweepItem {
            balance,
            ..item
        };
    }
    let mut fresh = SweepItem::new(balance);
    fresh.included = item.included && fresh.can_include();
    fresh
}

fn toggle(item: &mut SweepItem, included: bool) -> usize {
    let next = included && item.can_include();
    if item.included == next {
        return 0;
    }
    item.included = next;
    1
}

enum Command {
    Apply(BookEvent),
    Snapshot(oneshot::Sender<Vec<SweepItem>>),
    SetIncluded {
        mint: Option<Pubkey>,
        included: bool,
        reply: oneshot::Sender<usize>,
    },
    Capture(oneshot::Sender<ItemCapture>),
    Restore(ItemCapture),
    Reset,
}

/// [`ItemMap`] 的消息句柄，可在任意任务间克隆。
#[derive(Clone)]
pub struct ItemBook {
    commands: mpsc::UnboundedSender<Command>,
}

impl ItemBook {
    /// 启动持有清单的任务，所有句柄释放后任务退出。
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (commands, mut receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut map = ItemMap::default();
            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Apply(event) => map.apply(event),
                    Command::Snapshot(reply) => {
                        let _ = reply.send(map.snapshot());
                    }
                    Command::SetIncluded {
                        mint,
                        included,
                        reply,
                    } => {
                        let _ = reply.send(map.set_included(mint.as_ref(), included));
                    }
                    Command::Capture(reply) => {
                        let _ = reply.send(map.capture_items());
                    }
                    Command::Restore(capture) => map.restore_items(capture),
                    Command::Reset => map.reset(),
                }
            }
            debug!(target: "sweep::submission", items = map.len(), "清单任务退出");
        });
        (Self { commands }, handle)
    }

    pub fn apply(&self, event: BookEvent) {
        self.send(Command::Apply(event));
    }

    pub async fn snapshot(&self) -> SweepResult<Vec<SweepItem>> {
        self.request(Command::Snapshot).await
    }

    pub async fn set_included(&self, mint: Option<Pubkey>, included: bool) -> SweepResult<usize> {
        self.request(|reply| Command::SetIncluded {
            mint,
            included,
            reply,
        })
        .await
    }

    pub async fn capture_items(&self) -> SweepResult<ItemCapture> {
        self.request(Command::Capture).await
    }

    pub fn restore_items(&self, capture: ItemCapture) {
        self.send(Command::Restore(capture));
    }

    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(target: "sweep::submission", "清单任务已退出，丢弃更新");
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> SweepResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SweepError::BookClosed)?;
        response.await.map_err(|_| SweepError::BookClosed)
    }
}

impl DiscoveryObserver for ItemBook {
    fn on_balances(&self, balances: &[HeldBalance]) {
        self.apply(BookEvent::Balances(balances.to_vec()));
    }

    fn on_asset(&self, balance: &HeldBalance) {
        self.apply(BookEvent::Asset(balance.clone()));
    }

    fn on_quote(&self, mint: &Pubkey, quote: &QuoteResult) {
        self.apply(BookEvent::Quote(*mint, quote.clone()));
    }

    fn on_instructions(&self, mint: &Pubkey, instructions: &Arc<InstructionSet>) {
        self.apply(BookEvent::Instructions(*mint, instructions.clone()));
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.apply(BookEvent::Error(*mint, error.clone()));
    }
}

impl SubmissionObserver for ItemBook {
    fn on_state(&self, mint: &Pubkey, state: LifecycleState) {
        self.apply(BookEvent::State(*mint, state));
    }

    fn on_signature(&self, mint: &Pubkey, signature: &Signature) {
        self.apply(BookEvent::Signature(*mint, *signature));
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.apply(BookEvent::Error(*mint, error.clone()));
    }
}
