use anchor_lang::prelude::*;

pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod security;
pub mod state;

use instructions::*;

declare_id!("3S8rePy8Zy7TkxEWN8YDiKhorg3zTFiPrUNMkwYzAbzN");

/// Token swap escrow where the maker keeps custody of the offered tokens
/// and only delegates them to the offer PDA until a taker accepts.
#[program]
pub mod offer_escrow {
    use super::*;

    /// Record an offer and approve the offer PDA to move the offered tokens
    pub fn make_offer(
        ctx: Context<MakeOffer>,
        id: u64,
        token_a_offered_amount: u64,
        token_b_wanted_amount: u64,
    ) -> Result<()> {
        instructions::make_offer(ctx, id, token_a_offered_amount, token_b_wanted_amount)
    }

    /// Pay the wanted tokens to the maker and receive the offered ones
    pub fn take_offer(ctx: Context<TakeOffer>) -> Result<()> {
        instructions::take_offer(ctx)
    }
}
