//! Native model of the `offer_escrow` program: same account constraints,
//! same handler checks in the same order, same error codes.

use anchor_lang::{
    error::{ErrorCode, ERROR_CODE_OFFSET},
    AccountDeserialize, AccountSerialize, AnchorDeserialize, Discriminator, Space,
};
use offer_escrow::{constants::ANCHOR_DISCRIMINATOR, error::OfferError, instruction, state::Offer};
use solana_sdk::{
    instruction::{AccountMeta, InstructionError},
    program_pack::Pack,
    pubkey::Pubkey,
    system_program,
};
use spl_associated_token_account::get_associated_token_address;
use spl_token::state::{Account as TokenAccount, Mint};

use super::{associated_token, system, token, AccountsDb, Invocation, InstructionResult};

fn anchor_error(code: ErrorCode) -> InstructionError {
    InstructionError::Custom(code as u32)
}

fn offer_error(err: OfferError) -> InstructionError {
    InstructionError::Custom(ERROR_CODE_OFFSET + err as u32)
}

pub(super) fn process(invocation: &mut Invocation) -> InstructionResult {
    let data = invocation.data;
    if data.len() < ANCHOR_DISCRIMINATOR {
        return Err(anchor_error(ErrorCode::InstructionMissing));
    }
    let (discriminator, mut args) = data.split_at(ANCHOR_DISCRIMINATOR);

    if discriminator == instruction::MakeOffer::DISCRIMINATOR {
        let args = instruction::MakeOffer::deserialize(&mut args)
            .map_err(|_| anchor_error(ErrorCode::InstructionDidNotDeserialize))?;
        make_offer(invocation, args)
    } else if discriminator == instruction::TakeOffer::DISCRIMINATOR {
        take_offer(invocation)
    } else {
        Err(anchor_error(ErrorCode::InstructionFallbackNotFound))
    }
}

fn signer(invocation: &Invocation, index: usize) -> Result<AccountMeta, InstructionError> {
    let meta = invocation
        .accounts
        .get(index)
        .ok_or(anchor_error(ErrorCode::AccountNotEnoughKeys))?;
    if !meta.is_signer {
        return Err(anchor_error(ErrorCode::AccountNotSigner));
    }
    Ok(meta.clone())
}

fn key(invocation: &Invocation, index: usize) -> Result<Pubkey, InstructionError> {
    invocation
        .key(index)
        .map_err(|_| anchor_error(ErrorCode::AccountNotEnoughKeys))
}

/// Associated token, token and system program slots, in that order
fn check_programs(invocation: &Invocation, first: usize) -> InstructionResult {
    let expected = [
        spl_associated_token_account::id(),
        spl_token::id(),
        system_program::id(),
    ];
    for (offset, program) in expected.iter().enumerate() {
        if key(invocation, first + offset)? != *program {
            return Err(anchor_error(ErrorCode::InvalidProgramId));
        }
    }
    Ok(())
}

fn mint(db: &AccountsDb, key: &Pubkey) -> Result<Mint, InstructionError> {
    let account = db
        .get(key)
        .ok_or(anchor_error(ErrorCode::AccountNotInitialized))?;
    if account.owner != spl_token::id() {
        return Err(anchor_error(ErrorCode::AccountOwnedByWrongProgram));
    }
    Mint::unpack(&account.data).map_err(|_| anchor_error(ErrorCode::AccountDidNotDeserialize))
}

fn associated_account(
    db: &AccountsDb,
    key: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
) -> Result<TokenAccount, InstructionError> {
    let account = db
        .get(key)
        .ok_or(anchor_error(ErrorCode::AccountNotInitialized))?;
    if account.owner != spl_token::id() {
        return Err(anchor_error(ErrorCode::AccountOwnedByWrongProgram));
    }
    let state = TokenAccount::unpack(&account.data)
        .map_err(|_| anchor_error(ErrorCode::AccountDidNotDeserialize))?;
    if state.owner != *authority {
        return Err(anchor_error(ErrorCode::ConstraintTokenOwner));
    }
    if state.mint != *mint {
        return Err(anchor_error(ErrorCode::ConstraintTokenMint));
    }
    if *key != get_associated_token_address(authority, mint) {
        return Err(anchor_error(ErrorCode::ConstraintAssociated));
    }
    Ok(state)
}

fn load_offer(db: &AccountsDb, key: &Pubkey) -> Result<Offer, InstructionError> {
    let account = db
        .get(key)
        .ok_or(anchor_error(ErrorCode::AccountNotInitialized))?;
    if account.owner != offer_escrow::ID {
        return Err(anchor_error(ErrorCode::AccountOwnedByWrongProgram));
    }
    Offer::try_deserialize(&mut account.data.as_slice())
        .map_err(|_| anchor_error(ErrorCode::AccountDiscriminatorMismatch))
}

fn make_offer(invocation: &mut Invocation, args: instruction::MakeOffer) -> InstructionResult {
    let maker = signer(invocation, 0)?;
    let token_mint_a = key(invocation, 1)?;
    let token_mint_b = key(invocation, 2)?;
    let maker_token_account_a = key(invocation, 3)?;
    let offer_key = key(invocation, 4)?;
    check_programs(invocation, 5)?;

    mint(invocation.db, &token_mint_a)?;
    mint(invocation.db, &token_mint_b)?;
    let maker_account_a = associated_account(
        invocation.db,
        &maker_token_account_a,
        &token_mint_a,
        &maker.pubkey,
    )?;

    let (expected, bump) = Pubkey::find_program_address(
        &[
            Offer::PREFIX_SEED,
            maker.pubkey.as_ref(),
            &args.id.to_le_bytes(),
        ],
        &offer_escrow::ID,
    );
    if offer_key != expected {
        return Err(anchor_error(ErrorCode::ConstraintSeeds));
    }
    let space = ANCHOR_DISCRIMINATOR + Offer::INIT_SPACE;
    system::create_account(
        invocation.db,
        &maker.pubkey,
        &offer_key,
        invocation.env.rent.minimum_balance(space),
        space,
        offer_escrow::ID,
    )?;

    if args.token_a_offered_amount == 0 || args.token_b_wanted_amount == 0 {
        return Err(offer_error(OfferError::InvalidAmount));
    }
    if token_mint_a == token_mint_b {
        return Err(offer_error(OfferError::SameMint));
    }
    if maker_account_a.amount < args.token_a_offered_amount {
        return Err(offer_error(OfferError::InsufficientOfferedBalance));
    }

    token::approve(
        invocation.db,
        &maker_token_account_a,
        None,
        &offer_key,
        args.token_a_offered_amount,
        &maker,
        &[],
    )?;

    let offer = Offer {
        id: args.id,
        maker: maker.pubkey,
        token_mint_a,
        token_mint_b,
        token_a_amount: args.token_a_offered_amount,
        token_b_wanted_amount: args.token_b_wanted_amount,
        bump,
    };
    let mut data = Vec::with_capacity(space);
    offer
        .try_serialize(&mut data)
        .map_err(|_| anchor_error(ErrorCode::AccountDidNotSerialize))?;

    let mut account = invocation.db.load(&offer_key);
    account.data[..data.len()].copy_from_slice(&data);
    invocation.db.store(offer_key, account);
    Ok(())
}

fn take_offer(invocation: &mut Invocation) -> InstructionResult {
    let taker = signer(invocation, 0)?;
    let maker = key(invocation, 1)?;
    let token_mint_a = key(invocation, 2)?;
    let token_mint_b = key(invocation, 3)?;
    let maker_token_account_a = key(invocation, 4)?;
    let taker_token_account_a = key(invocation, 5)?;
    let taker_token_account_b = key(invocation, 6)?;
    let maker_token_account_b = key(invocation, 7)?;
    let offer_key = key(invocation, 8)?;
    check_programs(invocation, 9)?;

    if invocation.db.load(&maker).owner != system_program::id() {
        return Err(anchor_error(ErrorCode::AccountNotSystemOwned));
    }
    let decimals_a = mint(invocation.db, &token_mint_a)?.decimals;
    let decimals_b = mint(invocation.db, &token_mint_b)?.decimals;

    associated_account(invocation.db, &maker_token_account_a, &token_mint_a, &maker)?;
    associated_token::create(
        invocation.db,
        &invocation.env.rent,
        &taker.pubkey,
        &taker_token_account_a,
        &taker.pubkey,
        &token_mint_a,
        true,
    )?;
    associated_account(invocation.db, &taker_token_account_a, &token_mint_a, &taker.pubkey)?;
    associated_account(invocation.db, &taker_token_account_b, &token_mint_b, &taker.pubkey)?;
    associated_token::create(
        invocation.db,
        &invocation.env.rent,
        &taker.pubkey,
        &maker_token_account_b,
        &maker,
        &token_mint_b,
        true,
    )?;
    associated_account(invocation.db, &maker_token_account_b, &token_mint_b, &maker)?;

    let offer = load_offer(invocation.db, &offer_key)?;
    if offer.maker != maker
        || offer.token_mint_a != token_mint_a
        || offer.token_mint_b != token_mint_b
    {
        return Err(anchor_error(ErrorCode::ConstraintHasOne));
    }
    let derived = Pubkey::create_program_address(
        &[
            Offer::PREFIX_SEED,
            maker.as_ref(),
            &offer.id.to_le_bytes(),
            &[offer.bump],
        ],
        &offer_escrow::ID,
    );
    if derived.ok() != Some(offer_key) {
        return Err(anchor_error(ErrorCode::ConstraintSeeds));
    }

    token::transfer(
        invocation.db,
        &taker_token_account_b,
        Some((&token_mint_b, decimals_b)),
        &maker_token_account_b,
        offer.token_b_wanted_amount,
        &taker,
        &[],
    )?;
    // the offer PDA signs through its seeds
    token::transfer(
        invocation.db,
        &maker_token_account_a,
        Some((&token_mint_a, decimals_a)),
        &taker_token_account_a,
        offer.token_a_amount,
        &AccountMeta::new_readonly(offer_key, true),
        &[],
    )?;

    let lamports = invocation.db.remove(&offer_key).map_or(0, |account| account.lamports);
    invocation.db.credit(&maker, lamports)
}
