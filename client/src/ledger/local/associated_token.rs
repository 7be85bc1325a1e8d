use solana_sdk::{instruction::InstructionError, program_pack::Pack, pubkey::Pubkey, rent::Rent};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_token::state::{Account as TokenAccount, Mint};

use super::{system, token, AccountsDb, Invocation, InstructionResult};

pub(super) fn process(invocation: &mut Invocation) -> InstructionResult {
    let idempotent = match invocation.data {
        [] | [0] => false,
        [1] => true,
        _ => return Err(InstructionError::InvalidInstructionData),
    };

    let funder = invocation.signer_key(0)?;
    let address = invocation.key(1)?;
    let wallet = invocation.key(2)?;
    let mint = invocation.key(3)?;
    if invocation.key(5)? != spl_token::id() {
        return Err(InstructionError::IncorrectProgramId);
    }

    create(
        invocation.db,
        &invocation.env.rent,
        &funder,
        &address,
        &wallet,
        &mint,
        idempotent,
    )
}

/// Create the associated token account of `wallet` for `mint`, paid by
/// `funder`. With `idempotent` an existing matching account is accepted.
pub(super) fn create(
    db: &mut AccountsDb,
    rent: &Rent,
    funder: &Pubkey,
    address: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    idempotent: bool,
) -> InstructionResult {
    if *address != get_associated_token_address_with_program_id(wallet, mint, &spl_token::id()) {
        return Err(InstructionError::InvalidSeeds);
    }

    if idempotent {
        if let Ok(existing) = token::read::<TokenAccount>(db, address) {
            if existing.owner != *wallet {
                return Err(InstructionError::IllegalOwner);
            }
            if existing.mint != *mint {
                return Err(InstructionError::InvalidAccountData);
            }
            return Ok(());
        }
    }

    let _: Mint = token::read(db, mint)?;
    system::create_account(
        db,
        funder,
        address,
        rent.minimum_balance(TokenAccount::LEN),
        TokenAccount::LEN,
        spl_token::id(),
    )?;
    token::initialize_account(db, address, mint, wallet)
}
