//! 清扫引擎：余额发现、并发报价、指令构建、批次组装与签名提交。

pub mod amount;
pub mod assembler;
pub mod book;
pub mod builder;
pub mod catalog;
pub mod discovery;
pub mod error;
pub mod listing;
pub mod observer;
pub mod pipeline;
pub mod ports;
pub mod quote;
pub mod session;
pub mod submission;
pub mod transfer;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use amount::{Percentage, PercentageError};
pub use assembler::{BatchKind, SweepBatch};
pub use catalog::AssetCatalog;
pub use discovery::ExclusionList;
pub use error::{SignerError, SweepError, SweepResult};
pub use observer::{DiscoveryObserver, Fanout, NoopObserver, SubmissionObserver};
pub use pipeline::{DiscoveryReport, SweepServices, find_quotes, send_tokens, sweep_tokens};
pub use quote::QuotePlan;
pub use session::{SessionPhase, SessionServices, SessionSettings, SweepSession};
pub use submission::SubmissionReport;
pub use types::{
    AssetCatalogEntry, HeldBalance, InstructionSet, ItemError, LifecycleState, QuoteResult,
    SweepItem, TokenProgramKind,
};
