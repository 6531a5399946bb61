use thiserror::Error;

use crate::api::catalog::CatalogError;
use crate::rpc::LedgerError;

use super::session::SessionPhase;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("用户拒绝签名")]
    UserRejected,
    #[error("签名返回 {returned} 笔交易，预期 {expected} 笔")]
    Mismatch { expected: usize, returned: usize },
    #[error("签名结果与原交易消息不一致（第 {index} 笔）")]
    MessageChanged { index: usize },
    #[error("签名失败: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("代币目录不可用: {0}")]
    Catalog(#[from] CatalogError),
    #[error("链上查询失败: {0}")]
    Ledger(#[from] LedgerError),
    #[error("签名被拒绝，整批交易未提交")]
    Rejected,
    #[error("签名阶段失败: {0}")]
    Signer(SignerError),
    #[error("操作已取消")]
    Cancelled,
    #[error("当前会话阶段 {phase} 不允许执行 {operation}")]
    InvalidPhase {
        phase: SessionPhase,
        operation: &'static str,
    },
    #[error("清扫清单已关闭")]
    BookClosed,
}

impl From<SignerError> for SweepError {
    fn from(value: SignerError) -> Self {
        match value {
            SignerError::UserRejected => SweepError::Rejected,
            other => SweepError::Signer(other),
        }
    }
}

pub type SweepResult<T> = Result<T, SweepError>;
