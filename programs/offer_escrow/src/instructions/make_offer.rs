use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{approve, Approve, Mint, TokenAccount, TokenInterface},
};

use crate::{constants::ANCHOR_DISCRIMINATOR, events::OfferMade, security::validation, state::Offer};

pub fn make_offer(
    ctx: Context<MakeOffer>,
    id: u64,
    token_a_offered_amount: u64,
    token_b_wanted_amount: u64,
) -> Result<()> {
    // === Input Validation ===
    validation::validate_amount(token_a_offered_amount)?;
    validation::validate_amount(token_b_wanted_amount)?;
    validation::validate_distinct_mints(
        &ctx.accounts.token_mint_a.key(),
        &ctx.accounts.token_mint_b.key(),
    )?;
    validation::validate_offered_balance(
        ctx.accounts.maker_token_account_a.amount,
        token_a_offered_amount,
    )?;

    // === Delegate the offered tokens to the offer PDA ===
    delegate_offered_tokens(&ctx, token_a_offered_amount)?;

    // === Save the offer ===
    ctx.accounts.offer.set_inner(Offer {
        id,
        maker: ctx.accounts.maker.key(),
        token_mint_a: ctx.accounts.token_mint_a.key(),
        token_mint_b: ctx.accounts.token_mint_b.key(),
        token_a_amount: token_a_offered_amount,
        token_b_wanted_amount,
        bump: ctx.bumps.offer,
    });

    msg!("Offer {} made: {}", id, ctx.accounts.offer.key());

    emit!(OfferMade {
        offer: ctx.accounts.offer.key(),
        maker: ctx.accounts.maker.key(),
        id,
        token_mint_a: ctx.accounts.token_mint_a.key(),
        token_mint_b: ctx.accounts.token_mint_b.key(),
        token_a_amount: token_a_offered_amount,
        token_b_wanted_amount,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}

fn delegate_offered_tokens(ctx: &Context<MakeOffer>, amount: u64) -> Result<()> {
    let delegate_accounts = Approve {
        to: ctx.accounts.maker_token_account_a.to_account_info(),
        delegate: ctx.accounts.offer.to_account_info(),
        authority: ctx.accounts.maker.to_account_info(),
    };

    let cpi_ctx = CpiContext::new(
        ctx.accounts.token_program.to_account_info(),
        delegate_accounts,
    );

    approve(cpi_ctx, amount)
}

#[derive(Accounts)]
#[instruction(id: u64)]
pub struct MakeOffer<'info> {
    /// Pays for the offer account and authorizes the delegation
    #[account(mut)]
    pub maker: Signer<'info>,

    #[account(mint::token_program = token_program)]
    pub token_mint_a: InterfaceAccount<'info, Mint>,

    #[account(mint::token_program = token_program)]
    pub token_mint_b: InterfaceAccount<'info, Mint>,

    /// Source of the offered tokens once the offer is taken
    #[account(
        mut,
        associated_token::mint = token_mint_a,
        associated_token::authority = maker,
        associated_token::token_program = token_program
    )]
    pub maker_token_account_a: InterfaceAccount<'info, TokenAccount>,

    #[account(
        init,
        payer = maker,
        space = ANCHOR_DISCRIMINATOR + Offer::INIT_SPACE,
        seeds = [Offer::PREFIX_SEED, maker.key().as_ref(), id.to_le_bytes().as_ref()],
        bump
    )]
    pub offer: Account<'info, Offer>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}
