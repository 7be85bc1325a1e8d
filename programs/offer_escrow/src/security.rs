use anchor_lang::prelude::*;

/// Offer parameter checks shared by the instruction handlers
pub mod validation {
    use super::*;
    use crate::error::OfferError;

    /// Both legs of a swap must move a non-zero amount
    pub fn validate_amount(amount: u64) -> Result<()> {
        require!(amount > 0, OfferError::InvalidAmount);
        Ok(())
    }

    /// A swap of a mint against itself is rejected
    pub fn validate_distinct_mints(token_mint_a: &Pubkey, token_mint_b: &Pubkey) -> Result<()> {
        require_keys_neq!(*token_mint_a, *token_mint_b, OfferError::SameMint);
        Ok(())
    }

    /// The maker must hold what they offer at the time the offer is made
    pub fn validate_offered_balance(balance: u64, offered: u64) -> Result<()> {
        require!(balance >= offered, OfferError::InsufficientOfferedBalance);
        Ok(())
    }
}
