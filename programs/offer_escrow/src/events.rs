use anchor_lang::prelude::*;

/// Event emitted when a maker records a new offer
#[event]
pub struct OfferMade {
    pub offer: Pubkey,
    pub maker: Pubkey,
    pub id: u64,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub token_a_amount: u64,
    pub token_b_wanted_amount: u64,
    pub timestamp: i64,
}

/// Event emitted when a taker settles an offer
#[event]
pub struct OfferTaken {
    pub offer: Pubkey,
    pub maker: Pubkey,
    pub taker: Pubkey,
    pub id: u64,
    pub timestamp: i64,
}
