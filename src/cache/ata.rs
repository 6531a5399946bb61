use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;

use crate::sweep::types::TokenProgramKind;

pub static ASSOCIATED_TOKEN_PROGRAM_ID: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::new_from_array(spl_associated_token_account::ID.to_bytes()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtaKey {
    owner: Pubkey,
    mint: Pubkey,
    program: TokenProgramKind,
}

static ATA_CACHE: Lazy<DashMap<AtaKey, Pubkey>> = Lazy::new(DashMap::new);

/// 返回 `owner` 在 `mint` 上的关联代币账户地址，结果按 (owner, mint, program) 缓存。
pub fn cached_associated_token_address(
    owner: &Pubkey,
    mint: &Pubkey,
    program: TokenProgramKind,
) -> Pubkey {
    let key = AtaKey {
        owner: *owner,
        mint: *mint,
        program,
    };
    *ATA_CACHE.entry(key).or_insert_with(|| {
        Pubkey::find_program_address(
            &[
                owner.as_ref(),
                program.program_id().as_ref(),
                mint.as_ref(),
            ],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        )
        .0
    })
}
