use anchor_lang::prelude::*;

/// Terms of a pending swap. The offered tokens stay in the maker's account;
/// this PDA is only their approved delegate until the offer is taken.
#[account]
#[derive(InitSpace, Debug)]
pub struct Offer {
    /// Maker-chosen identifier, part of the PDA seeds
    pub id: u64,
    pub maker: Pubkey,
    /// Mint of the offered tokens
    pub token_mint_a: Pubkey,
    /// Mint of the wanted tokens
    pub token_mint_b: Pubkey,
    pub token_a_amount: u64,
    pub token_b_wanted_amount: u64,
    pub bump: u8,
}

impl Offer {
    pub const PREFIX_SEED: &'static [u8] = b"offer";
}
