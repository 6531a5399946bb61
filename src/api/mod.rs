//! 外部 HTTP 服务：Jupiter 报价/指令接口与代币目录。

pub mod catalog;
pub mod jupiter;
pub mod serde_helpers;

pub use catalog::{CatalogError, TokenListClient};
pub use jupiter::{JupiterApiClient, JupiterError};
