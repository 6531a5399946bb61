//! 流水线回调。所有方法默认空实现，调用方只覆盖关心的事件。
//!
//! 回调在网络任务内同步触发，实现方不应阻塞；需要汇总状态时把事件转发给
//! 单一所有者（参见 [`super::book::ItemBook`]）。

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use super::types::{HeldBalance, InstructionSet, ItemError, LifecycleState, QuoteResult};

pub trait DiscoveryObserver: Send + Sync {
    /// 余额发现完成，包含零余额的持仓。
    fn on_balances(&self, _balances: &[HeldBalance]) {}

    fn on_asset(&self, _balance: &HeldBalance) {}

    fn on_quote(&self, _mint: &Pubkey, _quote: &QuoteResult) {}

    fn on_instructions(&self, _mint: &Pubkey, _instructions: &Arc<InstructionSet>) {}

    fn on_error(&self, _mint: &Pubkey, _error: &ItemError) {}
}

pub trait SubmissionObserver: Send + Sync {
    fn on_state(&self, _mint: &Pubkey, _state: LifecycleState) {}

    fn on_signature(&self, _mint: &Pubkey, _signature: &Signature) {}

    fn on_error(&self, _mint: &Pubkey, _error: &ItemError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DiscoveryObserver for NoopObserver {}

impl SubmissionObserver for NoopObserver {}

impl<T: DiscoveryObserver + ?Sized> DiscoveryObserver for &T {
    fn on_balances(&self, balances: &[HeldBalance]) {
        (**self).on_balances(balances)
    }

    fn on_asset(&self, balance: &HeldBalance) {
        (**self).on_asset(balance)
    }

    fn on_quote(&self, mint: &Pubkey, quote: &QuoteResult) {
        (**self).on_quote(mint, quote)
    }

    fn on_instructions(&self, mint: &Pubkey, instructions: &Arc<InstructionSet>) {
        (**self).on_instructions(mint, instructions)
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        (**self).on_error(mint, error)
    }
}

impl<T: SubmissionObserver + ?Sized> SubmissionObserver for &T {
    fn on_state(&self, mint: &Pubkey, state: LifecycleState) {
        (**self).on_state(mint, state)
    }

    fn on_signature(&self, mint: &Pubkey, signature: &Signature) {
        (**self).on_signature(mint, signature)
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        (**self).on_error(mint, error)
    }
}

/// 把同一事件依次转发给两个观察者。
pub struct Fanout<A, B>(pub A, pub B);

impl<A: DiscoveryObserver, B: DiscoveryObserver> DiscoveryObserver for Fanout<A, B> {
    fn on_balances(&self, balances: &[HeldBalance]) {
        self.0.on_balances(balances);
        self.1.on_balances(balances);
    }

    fn on_asset(&self, balance: &HeldBalance) {
        self.0.on_asset(balance);
        self.1.on_asset(balance);
    }

    fn on_quote(&self, mint: &Pubkey, quote: &QuoteResult) {
        self.0.on_quote(mint, quote);
        self.1.on_quote(mint, quote);
    }

    fn on_instructions(&self, mint: &Pubkey, instructions: &Arc<InstructionSet>) {
        self.0.on_instructions(mint, instructions);
        self.1.on_instructions(mint, instructions);
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.0.on_error(mint, error);
        self.1.on_error(mint, error);
    }
}

impl<A: SubmissionObserver, B: SubmissionObserver> SubmissionObserver for Fanout<A, B> {
    fn on_state(&self, mint: &Pubkey, state: LifecycleState) {
        self.0.on_state(mint, state);
        self.1.on_state(mint, state);
    }

    fn on_signature(&self, mint: &Pubkey, signature: &Signature) {
        self.0.on_signature(mint, signature);
        self.1.on_signature(mint, signature);
    }

    fn on_error(&self, mint: &Pubkey, error: &ItemError) {
        self.0.on_error(mint, error);
        self.1.on_error(mint, error);
    }
}
