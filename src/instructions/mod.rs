//! 手工构建的 SPL 指令。

pub mod token;

pub use token::{
    SYSTEM_PROGRAM_ID, create_associated_token_account_idempotent, transfer_checked,
};
