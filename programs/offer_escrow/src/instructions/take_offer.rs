use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token_interface::{transfer_checked, Mint, TokenAccount, TokenInterface, TransferChecked},
};

use crate::{events::OfferTaken, state::Offer};

pub fn take_offer(ctx: Context<TakeOffer>) -> Result<()> {
    // Wanted leg first: a taker short of token B fails before the delegate is used
    send_wanted_tokens_to_maker(&ctx)?;
    send_offered_tokens_to_taker(&ctx)?;

    msg!(
        "Offer {} taken by {}",
        ctx.accounts.offer.id,
        ctx.accounts.taker.key()
    );

    emit!(OfferTaken {
        offer: ctx.accounts.offer.key(),
        maker: ctx.accounts.maker.key(),
        taker: ctx.accounts.taker.key(),
        id: ctx.accounts.offer.id,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}

fn send_wanted_tokens_to_maker(ctx: &Context<TakeOffer>) -> Result<()> {
    let transfer_accounts = TransferChecked {
        from: ctx.accounts.taker_token_account_b.to_account_info(),
        mint: ctx.accounts.token_mint_b.to_account_info(),
        to: ctx.accounts.maker_token_account_b.to_account_info(),
        authority: ctx.accounts.taker.to_account_info(),
    };

    let cpi_ctx = CpiContext::new(
        ctx.accounts.token_program.to_account_info(),
        transfer_accounts,
    );

    transfer_checked(
        cpi_ctx,
        ctx.accounts.offer.token_b_wanted_amount,
        ctx.accounts.token_mint_b.decimals,
    )
}

fn send_offered_tokens_to_taker(ctx: &Context<TakeOffer>) -> Result<()> {
    let maker_key = ctx.accounts.maker.key();
    let id_bytes = ctx.accounts.offer.id.to_le_bytes();
    let signer_seeds: [&[&[u8]]; 1] = [&[
        Offer::PREFIX_SEED,
        maker_key.as_ref(),
        id_bytes.as_ref(),
        &[ctx.accounts.offer.bump],
    ]];

    let transfer_accounts = TransferChecked {
        from: ctx.accounts.maker_token_account_a.to_account_info(),
        mint: ctx.accounts.token_mint_a.to_account_info(),
        to: ctx.accounts.taker_token_account_a.to_account_info(),
        authority: ctx.accounts.offer.to_account_info(),
    };

    let cpi_ctx = CpiContext::new_with_signer(
        ctx.accounts.token_program.to_account_info(),
        transfer_accounts,
        &signer_seeds,
    );

    transfer_checked(
        cpi_ctx,
        ctx.accounts.offer.token_a_amount,
        ctx.accounts.token_mint_a.decimals,
    )
}

#[derive(Accounts)]
pub struct TakeOffer<'info> {
    #[account(mut)]
    pub taker: Signer<'info>,

    /// Receives the wanted tokens and the offer rent
    #[account(mut)]
    pub maker: SystemAccount<'info>,

    pub token_mint_a: Box<InterfaceAccount<'info, Mint>>,

    pub token_mint_b: Box<InterfaceAccount<'info, Mint>>,

    #[account(
        mut,
        associated_token::mint = token_mint_a,
        associated_token::authority = maker,
        associated_token::token_program = token_program,
    )]
    pub maker_token_account_a: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = token_mint_a,
        associated_token::authority = taker,
        associated_token::token_program = token_program,
    )]
    pub taker_token_account_a: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        associated_token::mint = token_mint_b,
        associated_token::authority = taker,
        associated_token::token_program = token_program,
    )]
    pub taker_token_account_b: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = token_mint_b,
        associated_token::authority = maker,
        associated_token::token_program = token_program,
    )]
    pub maker_token_account_b: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        close = maker,
        has_one = maker,
        has_one = token_mint_a,
        has_one = token_mint_b,
        seeds = [Offer::PREFIX_SEED, maker.key().as_ref(), offer.id.to_le_bytes().as_ref()],
        bump = offer.bump
    )]
    pub offer: Account<'info, Offer>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Interface<'info, TokenInterface>,
    pub system_program: Program<'info, System>,
}
