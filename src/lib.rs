//! scoop：把钱包里的零散 SPL 代币一次性兑换成目标资产（或直接转走）。
//!
//! 流水线分为五段：余额发现 → 并发报价 → 指令构建 → 批量组装 → 签名提交。
//! 每个代币在各阶段独立成败，批次只在签名被拒绝时整体中止。

pub mod api;
pub mod cache;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod instructions;
pub mod lander;
pub mod monitoring;
pub mod rpc;
pub mod sweep;
pub mod wallet;
