use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::api::serde_helpers::field_as_string;

/// `/swap-instructions` 请求。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsRequest {
    /// 报价接口返回的原始 JSON，原样回传。
    pub quote_response: Value,
    #[serde(with = "field_as_string")]
    pub user_public_key: Pubkey,
    pub wrap_and_unwrap_sol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_compute_unit_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_unit_price_micro_lamports: Option<u64>,
}

impl SwapInstructionsRequest {
    pub fn new(quote_response: Value, user: Pubkey) -> Self {
        Self {
            quote_response,
            user_public_key: user,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: None,
            compute_unit_price_micro_lamports: None,
        }
    }
}

/// 服务端描述的单条指令，字段保持字符串形式，由调用方显式解码。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionPayload {
    pub program_id: String,
    pub accounts: Vec<AccountPayload>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPayload {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// `/swap-instructions` 响应。`cleanupInstruction` 与 `otherInstructions` 不参与清扫交易。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInstructionsResponse {
    #[serde(default)]
    pub compute_budget_instructions: Vec<InstructionPayload>,
    #[serde(default)]
    pub setup_instructions: Vec<InstructionPayload>,
    pub swap_instruction: InstructionPayload,
    #[serde(default)]
    pub cleanup_instruction: Option<InstructionPayload>,
    #[serde(default)]
    pub address_lookup_table_addresses: Vec<String>,
    #[serde(default)]
    pub compute_unit_limit: Option<u32>,
    #[serde(default)]
    pub prioritization_fee_lamports: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstructionDecodeError {
    #[error("程序地址 `{value}` 无效: {reason}")]
    ProgramId { value: String, reason: String },
    #[error("账户地址 `{value}` 无效: {reason}")]
    Account { value: String, reason: String },
    #[error("指令数据不是合法 base64: {0}")]
    Data(String),
    #[error("地址查找表 `{value}` 无效: {reason}")]
    LookupTable { value: String, reason: String },
}

impl InstructionPayload {
    /// 严格解码为原生指令，任一字段非法即整体失败。
    pub fn decode(&self) -> Result<Instruction, InstructionDecodeError> {
        let program_id = self.program_id.trim().parse::<Pubkey>().map_err(|err| {
            InstructionDecodeError::ProgramId {
                value: self.program_id.clone(),
                reason: err.to_string(),
            }
        })?;
        let accounts = self
            .accounts
            .iter()
            .map(AccountPayload::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let data = general_purpose::STANDARD
            .decode(self.data.trim().as_bytes())
            .map_err(|err| InstructionDecodeError::Data(err.to_string()))?;
        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }

    pub fn from_instruction(instruction: &Instruction) -> Self {
        Self {
            program_id: instruction.program_id.to_string(),
            accounts: instruction
                .accounts
                .iter()
                .map(|meta| AccountPayload {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: general_purpose::STANDARD.encode(&instruction.data),
        }
    }
}

impl AccountPayload {
    fn decode(&self) -> Result<AccountMeta, InstructionDecodeError> {
        let pubkey = self
            .pubkey
            .trim()
            .parse::<Pubkey>()
            .map_err(|err| InstructionDecodeError::Account {
                value: self.pubkey.clone(),
                reason: err.to_string(),
            })?;
        Ok(AccountMeta {
            pubkey,
            is_signer: self.is_signer,
            is_writable: self.is_writable,
        })
    }
}

impl SwapInstructionsResponse {
    pub fn lookup_table_addresses(&self) -> Result<Vec<Pubkey>, InstructionDecodeError> {
        self.address_lookup_table_addresses
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse::<Pubkey>()
                    .map_err(|err| InstructionDecodeError::LookupTable {
                        value: raw.clone(),
                        reason: err.to_string(),
                    })
            })
            .collect()
    }
}

/// 从 ComputeBudget 指令中读出 compute unit 上限。
pub fn parse_compute_budget_limit(instruction: &Instruction) -> Option<u32> {
    if instruction.program_id != solana_compute_budget_interface::id() {
        return None;
    }
    match instruction.data.as_slice() {
        [2, a, b, c, d, ..] => Some(u32::from_le_bytes([*a, *b, *c, *d])),
        _ => None,
    }
}
