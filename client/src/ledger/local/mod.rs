//! In-memory model of the slice of the Solana runtime this crate relies on.
//!
//! The model follows the runtime's observable contract rather than its
//! implementation:
//! 1. sanitize, reject signatures already in the status cache, verify every
//!    signature against the message bytes;
//! 2. age check: the message blockhash must be in the recent-blockhash queue,
//!    or the transaction must start with an advance-nonce instruction whose
//!    nonce account currently stores that blockhash;
//! 3. charge the fee, then run every instruction against a working copy of
//!    the accounts;
//! 4. commit the working copy on success. On an instruction failure only the
//!    fee and (for durable transactions) the nonce advance are committed.
//!
//! Programs are modelled natively: system, SPL token, associated token
//! account and `offer_escrow`.

mod associated_token;
mod offer;
mod system;
mod token;

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
};

use solana_sdk::{
    account::Account,
    hash::{hashv, Hash},
    instruction::{AccountMeta, InstructionError},
    message::Message,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    rent::Rent,
    sanitize::Sanitize,
    signature::Signature,
    system_program,
    transaction::{Transaction, TransactionError},
};
use tracing::{debug, warn};

use super::{Ledger, LedgerError};

/// Number of blockhashes a transaction may reference before it expires
pub const MAX_RECENT_BLOCKHASHES: usize = 150;

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

type InstructionResult = Result<(), InstructionError>;

/// Account store with "absent means empty system account" semantics
#[derive(Clone, Default)]
pub(crate) struct AccountsDb {
    accounts: HashMap<Pubkey, Account>,
}

impl AccountsDb {
    pub(crate) fn get(&self, key: &Pubkey) -> Option<&Account> {
        self.accounts.get(key)
    }

    pub(crate) fn load(&self, key: &Pubkey) -> Account {
        self.accounts
            .get(key)
            .cloned()
            .unwrap_or_else(|| Account::new(0, 0, &system_program::id()))
    }

    pub(crate) fn store(&mut self, key: Pubkey, account: Account) {
        if account.lamports == 0 && account.data.is_empty() {
            self.accounts.remove(&key);
        } else {
            self.accounts.insert(key, account);
        }
    }

    pub(crate) fn remove(&mut self, key: &Pubkey) -> Option<Account> {
        self.accounts.remove(key)
    }

    pub(crate) fn debit(&mut self, key: &Pubkey, lamports: u64) -> InstructionResult {
        let mut account = self.load(key);
        account.lamports = account
            .lamports
            .checked_sub(lamports)
            .ok_or(InstructionError::Custom(
                system::SystemError::ResultWithNegativeLamports as u32,
            ))?;
        self.store(*key, account);
        Ok(())
    }

    pub(crate) fn credit(&mut self, key: &Pubkey, lamports: u64) -> InstructionResult {
        let mut account = self.load(key);
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(InstructionError::ArithmeticOverflow)?;
        self.store(*key, account);
        Ok(())
    }
}

/// Cluster-wide values visible to every instruction of a transaction
pub(crate) struct Env {
    pub rent: Rent,
    pub blockhash: Hash,
    pub lamports_per_signature: u64,
}

/// One decompiled instruction being executed
pub(crate) struct Invocation<'a> {
    pub db: &'a mut AccountsDb,
    pub env: &'a Env,
    pub accounts: Vec<AccountMeta>,
    pub data: &'a [u8],
}

impl Invocation<'_> {
    pub(crate) fn key(&self, index: usize) -> Result<Pubkey, InstructionError> {
        self.accounts
            .get(index)
            .map(|meta| meta.pubkey)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    pub(crate) fn signer_key(&self, index: usize) -> Result<Pubkey, InstructionError> {
        let meta = self
            .accounts
            .get(index)
            .ok_or(InstructionError::NotEnoughAccountKeys)?;
        if !meta.is_signer {
            return Err(InstructionError::MissingRequiredSignature);
        }
        Ok(meta.pubkey)
    }

    /// Keys of every account that signed the enclosing transaction
    pub(crate) fn signers(&self) -> Vec<Pubkey> {
        self.accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect()
    }
}

struct Bank {
    db: AccountsDb,
    blockhashes: VecDeque<Hash>,
    /// Every processed signature, kept for the life of the ledger
    status_cache: HashSet<Signature>,
    rent: Rent,
    transaction_count: u64,
}

impl Bank {
    fn new() -> Self {
        let genesis = hashv(&[b"cosign-local-genesis"]);
        Self {
            db: AccountsDb::default(),
            blockhashes: VecDeque::from([genesis]),
            status_cache: HashSet::new(),
            rent: Rent::default(),
            transaction_count: 0,
        }
    }

    fn latest_blockhash(&self) -> Hash {
        *self.blockhashes.back().unwrap_or(&Hash::default())
    }

    fn register_blockhash(&mut self, seed: &[u8]) {
        let next = hashv(&[self.latest_blockhash().as_ref(), seed]);
        self.blockhashes.push_back(next);
        while self.blockhashes.len() > MAX_RECENT_BLOCKHASHES {
            self.blockhashes.pop_front();
        }
    }

    fn env(&self) -> Env {
        Env {
            rent: self.rent.clone(),
            blockhash: self.latest_blockhash(),
            lamports_per_signature: LAMPORTS_PER_SIGNATURE,
        }
    }

    fn process(&mut self, transaction: &Transaction) -> Result<Signature, TransactionError> {
        transaction
            .sanitize()
            .map_err(|_| TransactionError::SanitizeFailure)?;
        let signature = transaction.signatures[0];

        if self.status_cache.contains(&signature) {
            return Err(TransactionError::AlreadyProcessed);
        }
        transaction.verify()?;

        let message = &transaction.message;
        let durable_nonce = self.check_age(message)?;

        let fee_payer = message.account_keys[0];
        let fee = LAMPORTS_PER_SIGNATURE * transaction.signatures.len() as u64;
        let payer_lamports = self.db.get(&fee_payer).map(|a| a.lamports);
        match payer_lamports {
            None => return Err(TransactionError::AccountNotFound),
            Some(lamports) if lamports < fee => {
                return Err(TransactionError::InsufficientFundsForFee)
            }
            Some(_) => {}
        }

        let env = self.env();
        let mut fee_only = self.db.clone();
        fee_only
            .debit(&fee_payer, fee)
            .map_err(|_| TransactionError::InsufficientFundsForFee)?;

        let mut working = fee_only.clone();
        let outcome = execute_message(&mut working, &env, message);

        self.status_cache.insert(signature);
        self.transaction_count += 1;
        self.register_blockhash(signature.as_ref());

        match outcome {
            Ok(()) => {
                self.db = working;
                debug!("Local transaction {} committed", signature);
                Ok(signature)
            }
            Err(err) => {
                if durable_nonce {
                    // the nonce advance survives a failed payload
                    if let Err(advance_err) = execute_instruction(&mut fee_only, &env, message, 0) {
                        warn!(
                            "Nonce advance of failed transaction {} not applied: {}",
                            signature, advance_err
                        );
                    }
                }
                self.db = fee_only;
                warn!("Local transaction {} failed: {}", signature, err);
                Err(err)
            }
        }
    }

    /// Returns whether the transaction is admitted through a durable nonce
    fn check_age(&self, message: &Message) -> Result<bool, TransactionError> {
        if self.blockhashes.contains(&message.recent_blockhash) {
            return Ok(false);
        }
        match system::durable_nonce_of(&self.db, message) {
            Some(nonce) if nonce.blockhash() == message.recent_blockhash => {
                let authority_signed = message
                    .account_keys
                    .iter()
                    .take(message.header.num_required_signatures as usize)
                    .any(|key| *key == nonce.authority);
                if authority_signed {
                    Ok(true)
                } else {
                    Err(TransactionError::BlockhashNotFound)
                }
            }
            _ => Err(TransactionError::BlockhashNotFound),
        }
    }
}

fn is_writable(message: &Message, index: usize) -> bool {
    let header = &message.header;
    let required = header.num_required_signatures as usize;
    if index < required {
        index < required - header.num_readonly_signed_accounts as usize
    } else {
        let unsigned = message.account_keys.len() - required;
        index - required < unsigned - header.num_readonly_unsigned_accounts as usize
    }
}

fn execute_message(
    db: &mut AccountsDb,
    env: &Env,
    message: &Message,
) -> Result<(), TransactionError> {
    (0..message.instructions.len())
        .try_for_each(|index| execute_instruction(db, env, message, index))
}

fn execute_instruction(
    db: &mut AccountsDb,
    env: &Env,
    message: &Message,
    index: usize,
) -> Result<(), TransactionError> {
    let compiled = &message.instructions[index];
    let program_id = message.account_keys[compiled.program_id_index as usize];
    let accounts = compiled
        .accounts
        .iter()
        .map(|&i| {
            let i = i as usize;
            AccountMeta {
                pubkey: message.account_keys[i],
                is_signer: message.is_signer(i),
                is_writable: is_writable(message, i),
            }
        })
        .collect();

    let mut invocation = Invocation {
        db,
        env,
        accounts,
        data: &compiled.data,
    };

    let result = if program_id == system_program::id() {
        system::process(&mut invocation)
    } else if program_id == spl_token::id() {
        token::process(&mut invocation)
    } else if program_id == spl_associated_token_account::id() {
        associated_token::process(&mut invocation)
    } else if program_id == offer_escrow::ID {
        offer::process(&mut invocation)
    } else {
        Err(InstructionError::UnsupportedProgramId)
    };

    result.map_err(|err| TransactionError::InstructionError(index as u8, err))
}

/// In-memory [`Ledger`] for tests and dry runs. Single-threaded.
pub struct LocalLedger {
    bank: RefCell<Bank>,
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLedger {
    pub fn new() -> Self {
        Self {
            bank: RefCell::new(Bank::new()),
        }
    }

    /// Let every currently valid blockhash expire, as if
    /// [`MAX_RECENT_BLOCKHASHES`] slots had passed.
    pub fn expire_blockhashes(&self) {
        let mut bank = self.bank.borrow_mut();
        for slot in 0..MAX_RECENT_BLOCKHASHES as u64 {
            bank.register_blockhash(&slot.to_le_bytes());
        }
    }

    /// Overwrite an account directly
    pub fn set_account(&self, pubkey: Pubkey, account: Account) {
        self.bank.borrow_mut().db.store(pubkey, account);
    }

    /// Number of transactions that reached execution, failed ones included
    pub fn transaction_count(&self) -> u64 {
        self.bank.borrow().transaction_count
    }

    pub fn was_processed(&self, signature: &Signature) -> bool {
        self.bank.borrow().status_cache.contains(signature)
    }
}

impl Ledger for LocalLedger {
    fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, LedgerError> {
        Ok(self.bank.borrow().db.get(pubkey).cloned())
    }

    fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self
            .bank
            .borrow()
            .db
            .get(pubkey)
            .map_or(0, |account| account.lamports))
    }

    fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok(self.bank.borrow().rent.minimum_balance(data_len))
    }

    fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.bank.borrow().latest_blockhash())
    }

    fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        Ok(self.bank.borrow_mut().process(transaction)?)
    }

    fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, LedgerError> {
        let mut bank = self.bank.borrow_mut();
        bank.db
            .credit(pubkey, lamports)
            .map_err(|err| TransactionError::InstructionError(0, err))?;
        let signature = Signature::new_unique();
        bank.register_blockhash(signature.as_ref());
        debug!(
            "Airdropped {} SOL to {}",
            lamports as f64 / LAMPORTS_PER_SOL as f64,
            pubkey
        );
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::{
        signature::{Keypair, Signer},
        system_instruction,
    };

    use super::*;

    fn funded(ledger: &LocalLedger) -> Keypair {
        let keypair = Keypair::new();
        ledger
            .request_airdrop(&keypair.pubkey(), LAMPORTS_PER_SOL)
            .unwrap();
        keypair
    }

    fn transfer(from: &Keypair, to: &Pubkey, blockhash: Hash) -> Transaction {
        let ix = system_instruction::transfer(&from.pubkey(), to, 1_000);
        Transaction::new_signed_with_payer(&[ix], Some(&from.pubkey()), &[from], blockhash)
    }

    #[test]
    fn charges_fee_and_moves_lamports() {
        let ledger = LocalLedger::new();
        let from = funded(&ledger);
        let to = Pubkey::new_unique();
        let tx = transfer(&from, &to, ledger.get_latest_blockhash().unwrap());

        ledger.send_and_confirm_transaction(&tx).unwrap();

        assert_eq!(ledger.get_balance(&to).unwrap(), 1_000);
        assert_eq!(
            ledger.get_balance(&from.pubkey()).unwrap(),
            LAMPORTS_PER_SOL - 1_000 - LAMPORTS_PER_SIGNATURE
        );
    }

    #[test]
    fn rejects_resubmission() {
        let ledger = LocalLedger::new();
        let from = funded(&ledger);
        let tx = transfer(&from, &Pubkey::new_unique(), ledger.get_latest_blockhash().unwrap());

        ledger.send_and_confirm_transaction(&tx).unwrap();
        let err = ledger.send_and_confirm_transaction(&tx).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Rejected(TransactionError::AlreadyProcessed)
        ));
    }

    #[test]
    fn rejects_expired_blockhash() {
        let ledger = LocalLedger::new();
        let from = funded(&ledger);
        let blockhash = ledger.get_latest_blockhash().unwrap();
        ledger.expire_blockhashes();

        let tx = transfer(&from, &Pubkey::new_unique(), blockhash);
        let err = ledger.send_and_confirm_transaction(&tx).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Rejected(TransactionError::BlockhashNotFound)
        ));
        assert_eq!(ledger.get_balance(&from.pubkey()).unwrap(), LAMPORTS_PER_SOL);
    }

    #[test]
    fn failed_instruction_only_costs_the_fee() {
        let ledger = LocalLedger::new();
        let from = funded(&ledger);
        let to = Pubkey::new_unique();
        let ix = system_instruction::transfer(&from.pubkey(), &to, 2 * LAMPORTS_PER_SOL);
        let tx = Transaction::new_signed_with_payer(
            &[ix],
            Some(&from.pubkey()),
            &[&from],
            ledger.get_latest_blockhash().unwrap(),
        );

        let err = ledger.send_and_confirm_transaction(&tx).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Rejected(TransactionError::InstructionError(0, _))
        ));
        assert_eq!(ledger.get_balance(&to).unwrap(), 0);
        assert_eq!(
            ledger.get_balance(&from.pubkey()).unwrap(),
            LAMPORTS_PER_SOL - LAMPORTS_PER_SIGNATURE
        );
    }

    #[test]
    fn unsigned_transaction_fails_verification() {
        let ledger = LocalLedger::new();
        let from = funded(&ledger);
        let ix = system_instruction::transfer(&from.pubkey(), &Pubkey::new_unique(), 1);
        let mut tx = Transaction::new_with_payer(&[ix], Some(&from.pubkey()));
        tx.message.recent_blockhash = ledger.get_latest_blockhash().unwrap();

        let err = ledger.send_and_confirm_transaction(&tx).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Rejected(TransactionError::SignatureFailure)
        ));
    }
}
