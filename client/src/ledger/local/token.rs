use solana_sdk::{
    instruction::{AccountMeta, InstructionError},
    program_error::ProgramError,
    program_option::COption,
    program_pack::{IsInitialized, Pack},
    pubkey::Pubkey,
};
use spl_token::{
    error::TokenError,
    instruction::{is_valid_signer_index, TokenInstruction},
    state::{Account as TokenAccount, AccountState, Mint, Multisig},
};

use super::{AccountsDb, Invocation, InstructionResult};

fn token_error(err: TokenError) -> InstructionError {
    InstructionError::Custom(err as u32)
}

fn program_error(err: ProgramError) -> InstructionError {
    InstructionError::from(u64::from(err))
}

pub(super) fn read<T: Pack + IsInitialized>(
    db: &AccountsDb,
    key: &Pubkey,
) -> Result<T, InstructionError> {
    let account = db
        .get(key)
        .ok_or(InstructionError::UninitializedAccount)?;
    if account.owner != spl_token::id() {
        return Err(InstructionError::IncorrectProgramId);
    }
    T::unpack(&account.data).map_err(program_error)
}

pub(super) fn write<T: Pack>(db: &mut AccountsDb, key: &Pubkey, state: T) -> InstructionResult {
    let mut account = db.load(key);
    if account.owner != spl_token::id() || account.data.len() != T::LEN {
        return Err(InstructionError::InvalidAccountData);
    }
    T::pack(state, &mut account.data).map_err(program_error)?;
    db.store(*key, account);
    Ok(())
}

fn ensure_uninitialized<T: Pack + IsInitialized + Default>(
    db: &AccountsDb,
    key: &Pubkey,
) -> InstructionResult {
    let account = db.get(key).ok_or(InstructionError::UninitializedAccount)?;
    if account.owner != spl_token::id() || account.data.len() != T::LEN {
        return Err(InstructionError::InvalidAccountData);
    }
    let state = T::unpack_unchecked(&account.data).map_err(program_error)?;
    if state.is_initialized() {
        return Err(token_error(TokenError::AlreadyInUse));
    }
    Ok(())
}

fn ensure_rent_exempt(invocation: &Invocation, key: &Pubkey, len: usize) -> InstructionResult {
    let lamports = invocation.db.get(key).map_or(0, |a| a.lamports);
    if lamports < invocation.env.rent.minimum_balance(len) {
        return Err(token_error(TokenError::NotRentExempt));
    }
    Ok(())
}

/// Check that `authority` may act for `expected`, either as a direct signer
/// or as a multisig whose threshold is met by `signers`.
pub(super) fn validate_owner(
    db: &AccountsDb,
    expected: &Pubkey,
    authority: &AccountMeta,
    signers: &[AccountMeta],
) -> InstructionResult {
    if *expected != authority.pubkey {
        return Err(token_error(TokenError::OwnerMismatch));
    }
    let multisig = db
        .get(&authority.pubkey)
        .filter(|account| account.owner == spl_token::id() && account.data.len() == Multisig::LEN)
        .and_then(|account| Multisig::unpack(&account.data).ok());

    match multisig {
        Some(multisig) => {
            let members = &multisig.signers[..multisig.n as usize];
            let mut matched = [false; spl_token::instruction::MAX_SIGNERS];
            let mut num_signers = 0u8;
            for signer in signers {
                for (position, member) in members.iter().enumerate() {
                    if member == &signer.pubkey && !matched[position] {
                        if !signer.is_signer {
                            return Err(InstructionError::MissingRequiredSignature);
                        }
                        matched[position] = true;
                        num_signers += 1;
                    }
                }
            }
            if num_signers < multisig.m {
                return Err(InstructionError::MissingRequiredSignature);
            }
            Ok(())
        }
        None if authority.is_signer => Ok(()),
        None => Err(InstructionError::MissingRequiredSignature),
    }
}

fn check_mint(
    db: &AccountsDb,
    mint_key: &Pubkey,
    expected: &Pubkey,
    decimals: u8,
) -> InstructionResult {
    if mint_key != expected {
        return Err(token_error(TokenError::MintMismatch));
    }
    let mint: Mint = read(db, mint_key)?;
    if mint.decimals != decimals {
        return Err(token_error(TokenError::MintDecimalsMismatch));
    }
    Ok(())
}

/// Move `amount` from `source` to `destination`. `checked` carries the mint
/// account and the decimals the caller expects.
pub(super) fn transfer(
    db: &mut AccountsDb,
    source_key: &Pubkey,
    checked: Option<(&Pubkey, u8)>,
    destination_key: &Pubkey,
    amount: u64,
    authority: &AccountMeta,
    signers: &[AccountMeta],
) -> InstructionResult {
    let mut source: TokenAccount = read(db, source_key)?;
    let mut destination: TokenAccount = read(db, destination_key)?;

    if source.is_frozen() || destination.is_frozen() {
        return Err(token_error(TokenError::AccountFrozen));
    }
    if source.amount < amount {
        return Err(token_error(TokenError::InsufficientFunds));
    }
    if source.mint != destination.mint {
        return Err(token_error(TokenError::MintMismatch));
    }
    if let Some((mint_key, decimals)) = checked {
        check_mint(db, mint_key, &source.mint, decimals)?;
    }

    match source.delegate {
        COption::Some(ref delegate) if authority.pubkey == *delegate => {
            validate_owner(db, delegate, authority, signers)?;
            if source.delegated_amount < amount {
                return Err(token_error(TokenError::InsufficientFunds));
            }
            source.delegated_amount -= amount;
            if source.delegated_amount == 0 {
                source.delegate = COption::None;
            }
        }
        _ => validate_owner(db, &source.owner, authority, signers)?,
    }

    if source_key == destination_key {
        return write(db, source_key, source);
    }

    source.amount -= amount;
    destination.amount = destination
        .amount
        .checked_add(amount)
        .ok_or(token_error(TokenError::Overflow))?;
    write(db, source_key, source)?;
    write(db, destination_key, destination)
}

/// Make `delegate` the sole delegate of `source` for up to `amount`
pub(super) fn approve(
    db: &mut AccountsDb,
    source_key: &Pubkey,
    checked: Option<(&Pubkey, u8)>,
    delegate: &Pubkey,
    amount: u64,
    owner: &AccountMeta,
    signers: &[AccountMeta],
) -> InstructionResult {
    let mut source: TokenAccount = read(db, source_key)?;
    if source.is_frozen() {
        return Err(token_error(TokenError::AccountFrozen));
    }
    if let Some((mint_key, decimals)) = checked {
        check_mint(db, mint_key, &source.mint, decimals)?;
    }
    validate_owner(db, &source.owner, owner, signers)?;

    source.delegate = COption::Some(*delegate);
    source.delegated_amount = amount;
    write(db, source_key, source)
}

fn mint_to(
    db: &mut AccountsDb,
    mint_key: &Pubkey,
    destination_key: &Pubkey,
    amount: u64,
    decimals: Option<u8>,
    authority: &AccountMeta,
    signers: &[AccountMeta],
) -> InstructionResult {
    let mut destination: TokenAccount = read(db, destination_key)?;
    if destination.is_frozen() {
        return Err(token_error(TokenError::AccountFrozen));
    }
    if destination.mint != *mint_key {
        return Err(token_error(TokenError::MintMismatch));
    }

    let mut mint: Mint = read(db, mint_key)?;
    if let Some(decimals) = decimals {
        if decimals != mint.decimals {
            return Err(token_error(TokenError::MintDecimalsMismatch));
        }
    }
    match mint.mint_authority {
        COption::Some(mint_authority) => validate_owner(db, &mint_authority, authority, signers)?,
        COption::None => return Err(token_error(TokenError::FixedSupply)),
    }

    destination.amount = destination
        .amount
        .checked_add(amount)
        .ok_or(token_error(TokenError::Overflow))?;
    mint.supply = mint
        .supply
        .checked_add(amount)
        .ok_or(token_error(TokenError::Overflow))?;
    write(db, destination_key, destination)?;
    write(db, mint_key, mint)
}

/// Initialize a token account already allocated and owned by the token program
pub(super) fn initialize_account(
    db: &mut AccountsDb,
    key: &Pubkey,
    mint_key: &Pubkey,
    owner: &Pubkey,
) -> InstructionResult {
    ensure_uninitialized::<TokenAccount>(db, key)?;
    let _: Mint = read(db, mint_key).map_err(|_| token_error(TokenError::InvalidMint))?;
    let account = TokenAccount {
        mint: *mint_key,
        owner: *owner,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    };
    write(db, key, account)
}

fn initialize_mint(
    invocation: &mut Invocation,
    decimals: u8,
    mint_authority: Pubkey,
    freeze_authority: COption<Pubkey>,
    check_rent: bool,
) -> InstructionResult {
    let mint_key = invocation.key(0)?;
    ensure_uninitialized::<Mint>(invocation.db, &mint_key)?;
    if check_rent {
        ensure_rent_exempt(invocation, &mint_key, Mint::LEN)?;
    }
    let mint = Mint {
        mint_authority: COption::Some(mint_authority),
        supply: 0,
        decimals,
        is_initialized: true,
        freeze_authority,
    };
    write(invocation.db, &mint_key, mint)
}

fn initialize_multisig(
    invocation: &mut Invocation,
    m: u8,
    first_signer: usize,
) -> InstructionResult {
    let multisig_key = invocation.key(0)?;
    ensure_uninitialized::<Multisig>(invocation.db, &multisig_key)?;
    if first_signer > 1 {
        ensure_rent_exempt(invocation, &multisig_key, Multisig::LEN)?;
    }

    let members: Vec<Pubkey> = invocation
        .accounts
        .iter()
        .skip(first_signer)
        .map(|meta| meta.pubkey)
        .collect();
    if !is_valid_signer_index(members.len()) {
        return Err(token_error(TokenError::InvalidNumberOfProvidedSigners));
    }
    if !is_valid_signer_index(m as usize) || m as usize > members.len() {
        return Err(token_error(TokenError::InvalidNumberOfRequiredSigners));
    }

    let mut multisig = Multisig {
        m,
        n: members.len() as u8,
        is_initialized: true,
        ..Multisig::default()
    };
    multisig.signers[..members.len()].copy_from_slice(&members);
    write(invocation.db, &multisig_key, multisig)
}

pub(super) fn process(invocation: &mut Invocation) -> InstructionResult {
    let instruction = TokenInstruction::unpack(invocation.data).map_err(program_error)?;
    let metas = invocation.accounts.clone();
    let meta = |index: usize| metas.get(index).ok_or(InstructionError::NotEnoughAccountKeys);

    match instruction {
        TokenInstruction::InitializeMint {
            decimals,
            mint_authority,
            freeze_authority,
        } => initialize_mint(invocation, decimals, mint_authority, freeze_authority, true),
        TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority,
            freeze_authority,
        } => initialize_mint(invocation, decimals, mint_authority, freeze_authority, false),
        TokenInstruction::InitializeMultisig { m } => initialize_multisig(invocation, m, 2),
        TokenInstruction::InitializeMultisig2 { m } => initialize_multisig(invocation, m, 1),
        TokenInstruction::InitializeAccount => {
            let owner = meta(2)?.pubkey;
            initialize_account(invocation.db, &meta(0)?.pubkey, &meta(1)?.pubkey, &owner)
        }
        TokenInstruction::InitializeAccount3 { owner } => {
            initialize_account(invocation.db, &meta(0)?.pubkey, &meta(1)?.pubkey, &owner)
        }
        TokenInstruction::Transfer { amount } => transfer(
            invocation.db,
            &meta(0)?.pubkey,
            None,
            &meta(1)?.pubkey,
            amount,
            meta(2)?,
            &metas[3..],
        ),
        TokenInstruction::TransferChecked { amount, decimals } => transfer(
            invocation.db,
            &meta(0)?.pubkey,
            Some((&meta(1)?.pubkey, decimals)),
            &meta(2)?.pubkey,
            amount,
            meta(3)?,
            &metas[4..],
        ),
        TokenInstruction::Approve { amount } => approve(
            invocation.db,
            &meta(0)?.pubkey,
            None,
            &meta(1)?.pubkey,
            amount,
            meta(2)?,
            &metas[3..],
        ),
        TokenInstruction::ApproveChecked { amount, decimals } => approve(
            invocation.db,
            &meta(0)?.pubkey,
            Some((&meta(1)?.pubkey, decimals)),
            &meta(2)?.pubkey,
            amount,
            meta(3)?,
            &metas[4..],
        ),
        TokenInstruction::MintTo { amount } => mint_to(
            invocation.db,
            &meta(0)?.pubkey,
            &meta(1)?.pubkey,
            amount,
            None,
            meta(2)?,
            &metas[3..],
        ),
        TokenInstruction::MintToChecked { amount, decimals } => mint_to(
            invocation.db,
            &meta(0)?.pubkey,
            &meta(1)?.pubkey,
            amount,
            Some(decimals),
            meta(2)?,
            &metas[3..],
        ),
        _ => Err(InstructionError::InvalidInstructionData),
    }
}
