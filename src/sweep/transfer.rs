use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::cache::cached_associated_token_address;
use crate::instructions::{create_associated_token_account_idempotent, transfer_checked};

use super::types::HeldBalance;

/// 直接转账路径的指令对：幂等创建目标 ATA，再 `TransferChecked`。
///
/// 数量为 0 时返回空列表，组装阶段会静默丢弃该代币。
pub fn transfer_instructions(
    payer: &Pubkey,
    balance: &HeldBalance,
    destination_owner: &Pubkey,
    amount: u64,
) -> Vec<Instruction> {
    if amount == 0 {
        return Vec::new();
    }
    let mint = balance.mint();
    let destination =
        cached_associated_token_address(destination_owner, &mint, balance.program);
    vec![
        create_associated_token_account_idempotent(
            payer,
            destination_owner,
            &mint,
            balance.program,
        ),
        transfer_checked(
            balance.program,
            &balance.account,
            &mint,
            &destination,
            payer,
            amount,
            balance.asset.decimals,
        ),
    ]
}
