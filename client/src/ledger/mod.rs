//! The external ledger as this crate consumes it.
//!
//! Everything the signing flow needs from a cluster goes through [`Ledger`]:
//! account lookups, the current liveness marker, rent figures and a single
//! submit-and-confirm call. [`RpcLedger`] talks to a real cluster,
//! [`LocalLedger`] models the same contract in memory.

mod local;
mod rpc;

pub use local::{LocalLedger, LAMPORTS_PER_SIGNATURE, MAX_RECENT_BLOCKHASHES};
pub use rpc::RpcLedger;

use std::time::Duration;

use solana_client::client_error::ClientError;
use solana_sdk::{
    account::Account,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::{Transaction, TransactionError},
};
use thiserror::Error;
use tracing::debug;

use crate::error::{Result, SigningError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] TransactionError),

    #[error("transaction {0} not confirmed within {1:?}")]
    ConfirmationTimeout(Signature, Duration),

    #[error("rpc error: {0}")]
    Rpc(#[source] Box<ClientError>),
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err.get_transaction_error() {
            Some(tx_err) => Self::Rejected(tx_err),
            None => Self::Rpc(Box::new(err)),
        }
    }
}

pub trait Ledger {
    /// `None` when the account does not exist
    fn get_account(&self, pubkey: &Pubkey) -> std::result::Result<Option<Account>, LedgerError>;

    fn get_balance(&self, pubkey: &Pubkey) -> std::result::Result<u64, LedgerError>;

    fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> std::result::Result<u64, LedgerError>;

    /// Current short-lived liveness marker
    fn get_latest_blockhash(&self) -> std::result::Result<Hash, LedgerError>;

    /// Submit once and wait for the verdict. Implementations never retry.
    fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> std::result::Result<Signature, LedgerError>;

    fn request_airdrop(
        &self,
        pubkey: &Pubkey,
        lamports: u64,
    ) -> std::result::Result<Signature, LedgerError>;
}

/// Sign `instructions` with every signer at once against the latest
/// blockhash and submit them. Used for single-party setup transactions.
pub fn send_instructions(
    ledger: &dyn Ledger,
    instructions: &[Instruction],
    payer: &Pubkey,
    signers: &[&Keypair],
) -> Result<Signature> {
    let mut unique: Vec<&Keypair> = Vec::with_capacity(signers.len());
    for signer in signers {
        if !unique.iter().any(|seen| seen.pubkey() == signer.pubkey()) {
            unique.push(signer);
        }
    }

    let blockhash = ledger.get_latest_blockhash()?;
    let mut transaction = Transaction::new_with_payer(instructions, Some(payer));
    transaction
        .try_sign(&unique, blockhash)
        .map_err(SigningError::from)?;

    let signature = ledger
        .send_and_confirm_transaction(&transaction)
        .map_err(crate::error::SubmissionError::from)?;
    debug!("Confirmed transaction {}", signature);
    Ok(signature)
}
