//! 本地密钥签名：解析私钥、整批确认后一次性签名。

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;
use tracing::{info, warn};

use crate::sweep::error::SignerError;
use crate::sweep::ports::BatchSigner;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("未配置私钥，请设置 global.wallet.private_key 或环境变量 SCOOP_PRIVATE_KEY")]
    Missing,
    #[error("私钥格式无效: {0}")]
    Invalid(String),
}

/// 支持 JSON 数组、逗号分隔字节与 base58 三种写法。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair, WalletError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WalletError::Missing);
    }

    let bytes = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed)
            .map_err(|err| WalletError::Invalid(err.to_string()))?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| WalletError::Invalid(err.to_string()))?
    } else {
        bs58::decode(trimmed)
            .into_vec()
            .map_err(|err| WalletError::Invalid(err.to_string()))?
    };

    Keypair::try_from(bytes.as_slice()).map_err(|err| WalletError::Invalid(err.to_string()))
}

/// 待签批次的摘要，用于向用户确认。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub signer: Pubkey,
    pub transactions: usize,
}

#[async_trait]
pub trait BatchApproval: Send + Sync {
    async fn approve(&self, summary: &BatchSummary) -> bool;
}

/// 不询问直接同意，对应 `--yes`。
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl BatchApproval for AutoApprove {
    async fn approve(&self, _summary: &BatchSummary) -> bool {
        true
    }
}

/// 在终端询问 y/N，只有明确输入 y 才视为同意。
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptApproval;

#[async_trait]
impl BatchApproval for PromptApproval {
    async fn approve(&self, summary: &BatchSummary) -> bool {
        let prompt = format!(
            "即将由 {} 签署 {} 笔交易，确认提交？[y/N] ",
            summary.signer, summary.transactions
        );
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(err)) => {
                warn!(target: "wallet", error = %err, "读取确认输入失败，按拒绝处理");
                false
            }
            Err(err) => {
                warn!(target: "wallet", error = %err, "确认任务异常退出，按拒绝处理");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// 持有本地私钥的批量签名器。
pub struct KeypairSigner<A> {
    keypair: Keypair,
    approval: A,
}

impl<A: BatchApproval> KeypairSigner<A> {
    pub fn new(keypair: Keypair, approval: A) -> Self {
        Self { keypair, approval }
    }
}

#[async_trait]
impl<A: BatchApproval> BatchSigner for KeypairSigner<A> {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerError> {
        let summary = BatchSummary {
            signer: self.keypair.pubkey(),
            transactions: transactions.len(),
        };
        if !self.approval.approve(&summary).await {
            info!(target: "wallet", transactions = summary.transactions, "用户拒绝签名");
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

#[cfg(test)]
mod tests {
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{VersionedMessage, v0};
    use solana_sdk::signature::Signature;

    use super::*;

    struct Decline;

    #[async_trait]
    impl BatchApproval for Decline {
        async fn approve(&self, _summary: &BatchSummary) -> bool {
            false
        }
    }

    fn unsigned_transfer(payer: &Pubkey) -> VersionedTransaction {
        let message = v0::Message::try_compile(payer, &[], &[], Hash::new_unique()).unwrap();
        VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::V0(message),
        }
    }

    #[test]
    fn parses_all_key_formats() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let json = serde_json::to_string(&bytes.to_vec()).unwrap();
        let comma = bytes
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let base58 = bs58::encode(bytes).into_string();

        for raw in [json, comma, base58] {
            let parsed = parse_keypair_string(&raw).expect("parse keypair");
            assert_eq!(parsed.pubkey(), keypair.pubkey());
        }
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(parse_keypair_string("  "), Err(WalletError::Missing)));
        assert!(matches!(
            parse_keypair_string("1,2,3"),
            Err(WalletError::Invalid(_))
        ));
        assert!(matches!(
            parse_keypair_string("0OIl"),
            Err(WalletError::Invalid(_))
        ));
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("nope"));
    }

    #[tokio::test]
    async fn signs_whole_batch_after_approval() {
        let signer = KeypairSigner::new(Keypair::new(), AutoApprove);
        let payer = signer.pubkey();
        let signed = signer
            .sign_all(vec![unsigned_transfer(&payer), unsigned_transfer(&payer)])
            .await
            .expect("sign");
        assert_eq!(signed.len(), 2);
        for tx in &signed {
            assert_ne!(tx.signatures[0], Signature::default());
            assert!(tx.verify_with_results().iter().all(|ok| *ok));
        }
    }

    #[tokio::test]
    async fn declined_batch_is_user_rejection() {
        let signer = KeypairSigner::new(Keypair::new(), Decline);
        let payer = signer.pubkey();
        let result = signer.sign_all(vec![unsigned_transfer(&payer)]).await;
        assert!(matches!(result, Err(SignerError::UserRejected)));
    }
}
