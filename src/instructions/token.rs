use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::cache::ata::{ASSOCIATED_TOKEN_PROGRAM_ID, cached_associated_token_address};
use crate::sweep::types::TokenProgramKind;

pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

const CREATE_IDEMPOTENT_TAG: u8 = 1;
const TRANSFER_CHECKED_TAG: u8 = 12;

/// 幂等创建 `owner` 在 `mint` 上的 ATA，已存在时不报错。
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    program: TokenProgramKind,
) -> Instruction {
    let associated = cached_associated_token_address(owner, mint, program);
    Instruction {
        program_id: *ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(associated, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(program.program_id(), false),
        ],
        data: vec![CREATE_IDEMPOTENT_TAG],
    }
}

/// `TransferChecked`：Token 与 Token-2022 共用同一指令布局。
pub fn transfer_checked(
    program: TokenProgramKind,
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = Vec::with_capacity(10);
    data.push(TRANSFER_CHECKED_TAG);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: program.program_id(),
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data,
    }
}
