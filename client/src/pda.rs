//! Program-derived addresses used by the multisig program.

use solana_sdk::pubkey::Pubkey;

/// Seed prefix shared by every multisig-owned account
pub const SEED_PREFIX: &[u8] = b"multisig";
/// Vault seed
pub const SEED_VAULT: &[u8] = b"vault";
/// Transaction seed
pub const SEED_TRANSACTION: &[u8] = b"transaction";
/// Proposal seed
pub const SEED_PROPOSAL: &[u8] = b"proposal";

/// Vault account for `multisig` at `vault_index`
pub fn vault_address(multisig: &Pubkey, vault_index: u8, program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[SEED_PREFIX, multisig.as_ref(), SEED_VAULT, &[vault_index]],
        program_id,
    )
    .0
}

/// Proposal account for `transaction_index` of `multisig`
pub fn proposal_address(multisig: &Pubkey, transaction_index: u64, program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            SEED_PREFIX,
            multisig.as_ref(),
            SEED_TRANSACTION,
            &transaction_index.to_le_bytes(),
            SEED_PROPOSAL,
        ],
        program_id,
    )
    .0
}
