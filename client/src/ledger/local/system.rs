use solana_sdk::{
    account::Account,
    instruction::InstructionError,
    message::Message,
    nonce::state::{Data, DurableNonce, State, Versions},
    pubkey::Pubkey,
    system_instruction::SystemInstruction,
    system_program,
};

pub(crate) use solana_sdk::system_instruction::SystemError;

use super::{AccountsDb, Invocation, InstructionResult};

fn custom(err: SystemError) -> InstructionError {
    InstructionError::Custom(err as u32)
}

pub(super) fn process(invocation: &mut Invocation) -> InstructionResult {
    let instruction: SystemInstruction = bincode::deserialize(invocation.data)
        .map_err(|_| InstructionError::InvalidInstructionData)?;

    match instruction {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let from = invocation.signer_key(0)?;
            let to = invocation.signer_key(1)?;
            create_account(invocation.db, &from, &to, lamports, space as usize, owner)
        }
        SystemInstruction::Transfer { lamports } => {
            let from = invocation.signer_key(0)?;
            let to = invocation.key(1)?;
            invocation.db.debit(&from, lamports)?;
            invocation.db.credit(&to, lamports)
        }
        SystemInstruction::InitializeNonceAccount(authority) => {
            let nonce = invocation.key(0)?;
            let mut account = invocation.db.load(&nonce);
            if account.owner != system_program::id() || account.data.len() != State::size() {
                return Err(InstructionError::InvalidAccountData);
            }
            if !matches!(read_nonce(&account)?, State::Uninitialized) {
                return Err(InstructionError::InvalidAccountData);
            }
            if account.lamports < invocation.env.rent.minimum_balance(State::size()) {
                return Err(InstructionError::InsufficientFunds);
            }
            let data = Data::new(
                authority,
                DurableNonce::from_blockhash(&invocation.env.blockhash),
                invocation.env.lamports_per_signature,
            );
            write_nonce(&mut account, data)?;
            invocation.db.store(nonce, account);
            Ok(())
        }
        SystemInstruction::AdvanceNonceAccount => {
            let nonce = invocation.key(0)?;
            let mut account = invocation.db.load(&nonce);
            if account.owner != system_program::id() {
                return Err(InstructionError::InvalidAccountOwner);
            }
            let data = match read_nonce(&account)? {
                State::Initialized(data) => data,
                State::Uninitialized => return Err(InstructionError::InvalidAccountData),
            };
            if !invocation.signers().contains(&data.authority) {
                return Err(InstructionError::MissingRequiredSignature);
            }
            let next = DurableNonce::from_blockhash(&invocation.env.blockhash);
            if data.durable_nonce == next {
                return Err(custom(SystemError::NonceBlockhashNotExpired));
            }
            let advanced = Data::new(data.authority, next, invocation.env.lamports_per_signature);
            write_nonce(&mut account, advanced)?;
            invocation.db.store(nonce, account);
            Ok(())
        }
        _ => Err(InstructionError::InvalidInstructionData),
    }
}

/// Fund and allocate a brand new account. `to` must hold nothing yet.
pub(crate) fn create_account(
    db: &mut AccountsDb,
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    space: usize,
    owner: Pubkey,
) -> InstructionResult {
    let existing = db.load(to);
    if existing.lamports > 0 || !existing.data.is_empty() || existing.owner != system_program::id()
    {
        return Err(custom(SystemError::AccountAlreadyInUse));
    }
    db.debit(from, lamports)?;
    db.store(
        *to,
        Account {
            lamports,
            data: vec![0; space],
            owner,
            executable: false,
            rent_epoch: 0,
        },
    );
    Ok(())
}

fn read_nonce(account: &Account) -> Result<State, InstructionError> {
    let versions: Versions =
        bincode::deserialize(&account.data).map_err(|_| InstructionError::InvalidAccountData)?;
    Ok(versions.state().clone())
}

fn write_nonce(account: &mut Account, data: Data) -> InstructionResult {
    let bytes = bincode::serialize(&Versions::new(State::Initialized(data)))
        .map_err(|_| InstructionError::InvalidAccountData)?;
    if account.data.len() < bytes.len() {
        return Err(InstructionError::AccountDataTooSmall);
    }
    account.data[..bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

/// Nonce data referenced by a transaction whose first instruction advances
/// a nonce account, if that account is initialized
pub(super) fn durable_nonce_of(db: &AccountsDb, message: &Message) -> Option<Data> {
    let first = message.instructions.first()?;
    if message.account_keys.get(first.program_id_index as usize)? != &system_program::id() {
        return None;
    }
    let instruction: SystemInstruction = bincode::deserialize(&first.data).ok()?;
    if instruction != SystemInstruction::AdvanceNonceAccount {
        return None;
    }
    let nonce_key = message.account_keys.get(*first.accounts.first()? as usize)?;
    let account = db.get(nonce_key)?;
    if account.owner != system_program::id() {
        return None;
    }
    match read_nonce(account).ok()? {
        State::Initialized(data) => Some(data),
        State::Uninitialized => None,
    }
}
