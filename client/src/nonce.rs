//! Durable nonce accounts.
//!
//! A nonce account stores a blockhash-like value that stays valid until the
//! account is advanced. Bundles signed against it survive for as long as the
//! hand-off between parties takes, and become unusable the moment any
//! transaction that advances the nonce lands.

use solana_sdk::{
    account::Account,
    hash::Hash,
    nonce::state::{State, Versions},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction, system_program,
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use crate::{
    error::{ProvisioningError, Result, SigningError, SubmissionError},
    ledger::{self, Ledger},
};

/// Current value of a nonce account, i.e. the authorization token a
/// durable bundle is signed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceInfo {
    pub account: Pubkey,
    pub authority: Pubkey,
    /// Stored durable nonce, used in place of a recent blockhash
    pub blockhash: Hash,
    pub lamports_per_signature: u64,
}

/// Decode a nonce account. Anything but a system-owned, initialized nonce
/// account is malformed.
pub fn parse(account_key: &Pubkey, account: &Account) -> Result<NonceInfo, ProvisioningError> {
    let malformed = |reason: &str| ProvisioningError::MalformedAccount {
        account: *account_key,
        reason: reason.to_string(),
    };

    if account.owner != system_program::id() {
        return Err(malformed("not owned by the system program"));
    }
    if account.data.len() != State::size() {
        return Err(malformed("unexpected data length"));
    }
    let versions: Versions =
        bincode::deserialize(&account.data).map_err(|err| malformed(&err.to_string()))?;

    match versions.state() {
        State::Initialized(data) => Ok(NonceInfo {
            account: *account_key,
            authority: data.authority,
            blockhash: data.blockhash(),
            lamports_per_signature: data.fee_calculator.lamports_per_signature,
        }),
        State::Uninitialized => Err(malformed("not initialized")),
    }
}

/// `None` when the account does not exist
pub fn fetch(
    ledger: &dyn Ledger,
    account: &Pubkey,
) -> Result<Option<NonceInfo>, ProvisioningError> {
    match ledger.get_account(account)? {
        Some(data) => parse(account, &data).map(Some),
        None => Ok(None),
    }
}

/// Return the nonce account at `nonce_keypair`, creating and initializing it
/// first when it does not exist yet. Safe to call repeatedly.
pub fn provision(
    ledger: &dyn Ledger,
    nonce_keypair: &Keypair,
    funder: &Keypair,
    authority: &Pubkey,
) -> Result<NonceInfo, ProvisioningError> {
    let account = nonce_keypair.pubkey();
    if let Some(existing) = fetch(ledger, &account)? {
        if existing.authority != *authority {
            warn!(
                "Nonce account {} is controlled by {}, not {}",
                account, existing.authority, authority
            );
        }
        debug!("Reusing nonce account {}", account);
        return Ok(existing);
    }

    let lamports = ledger.get_minimum_balance_for_rent_exemption(State::size())?;
    let instructions =
        system_instruction::create_nonce_account(&funder.pubkey(), &account, authority, lamports);

    let blockhash = ledger.get_latest_blockhash()?;
    let mut transaction = Transaction::new_with_payer(&instructions, Some(&funder.pubkey()));
    transaction
        .try_sign(&[funder, nonce_keypair], blockhash)
        .map_err(SigningError::from)?;

    let signature = ledger
        .send_and_confirm_transaction(&transaction)
        .map_err(|err| {
            ProvisioningError::from_submission(SubmissionError::from(err), account, funder.pubkey())
        })?;
    info!("Created nonce account {} in {}", account, signature);

    fetch(ledger, &account)?.ok_or(ProvisioningError::ProvisioningTimeout { account, signature })
}

/// Advance the nonce, invalidating every bundle signed against its current
/// value
pub fn advance(
    ledger: &dyn Ledger,
    nonce_account: &Pubkey,
    authority: &Keypair,
    fee_payer: &Keypair,
) -> Result<Signature> {
    let instruction = system_instruction::advance_nonce_account(nonce_account, &authority.pubkey());
    let signature = ledger::send_instructions(
        ledger,
        &[instruction],
        &fee_payer.pubkey(),
        &[fee_payer, authority],
    )?;
    info!("Advanced nonce account {}", nonce_account);
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use solana_sdk::native_token::LAMPORTS_PER_SOL;

    use super::*;
    use crate::ledger::{LedgerError, LocalLedger};

    /// What a cluster does with a submitted transaction
    enum Outcome {
        /// Sent but never seen confirmed
        Unconfirmed,
        /// Confirmed, yet the account it created cannot be read back
        Lost,
    }

    struct FlakyLedger {
        inner: LocalLedger,
        outcome: Outcome,
    }

    impl Ledger for FlakyLedger {
        fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, LedgerError> {
            self.inner.get_account(pubkey)
        }

        fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
            self.inner.get_balance(pubkey)
        }

        fn get_minimum_balance_for_rent_exemption(
            &self,
            data_len: usize,
        ) -> Result<u64, LedgerError> {
            self.inner.get_minimum_balance_for_rent_exemption(data_len)
        }

        fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
            self.inner.get_latest_blockhash()
        }

        fn send_and_confirm_transaction(
            &self,
            transaction: &Transaction,
        ) -> Result<Signature, LedgerError> {
            let signature = transaction.signatures[0];
            match self.outcome {
                Outcome::Unconfirmed => Err(LedgerError::ConfirmationTimeout(
                    signature,
                    Duration::from_secs(60),
                )),
                Outcome::Lost => Ok(signature),
            }
        }

        fn request_airdrop(
            &self,
            pubkey: &Pubkey,
            lamports: u64,
        ) -> Result<Signature, LedgerError> {
            self.inner.request_airdrop(pubkey, lamports)
        }
    }

    fn flaky(outcome: Outcome) -> (FlakyLedger, Keypair) {
        let ledger = FlakyLedger {
            inner: LocalLedger::new(),
            outcome,
        };
        let funder = Keypair::new();
        ledger
            .request_airdrop(&funder.pubkey(), LAMPORTS_PER_SOL)
            .unwrap();
        (ledger, funder)
    }

    fn funded(ledger: &LocalLedger) -> Keypair {
        let keypair = Keypair::new();
        ledger
            .request_airdrop(&keypair.pubkey(), LAMPORTS_PER_SOL)
            .unwrap();
        keypair
    }

    #[test]
    fn missing_account_fetches_none() {
        let ledger = LocalLedger::new();
        assert_eq!(fetch(&ledger, &Pubkey::new_unique()).unwrap(), None);
    }

    #[test]
    fn wallet_account_is_malformed() {
        let ledger = LocalLedger::new();
        let wallet = funded(&ledger);
        let err = fetch(&ledger, &wallet.pubkey()).unwrap_err();
        assert!(matches!(err, ProvisioningError::MalformedAccount { .. }));
    }

    #[test]
    fn provision_is_idempotent() {
        let ledger = LocalLedger::new();
        let funder = funded(&ledger);
        let nonce = Keypair::new();

        let created = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap();
        let count = ledger.transaction_count();
        let again = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap();

        assert_eq!(created, again);
        assert_eq!(ledger.transaction_count(), count);
        assert_eq!(created.authority, funder.pubkey());
    }

    #[test]
    fn unfunded_provisioning_reports_funder() {
        let ledger = LocalLedger::new();
        let funder = Keypair::new();
        ledger.request_airdrop(&funder.pubkey(), 10_000).unwrap();
        let nonce = Keypair::new();

        let err = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::InsufficientFunds { funder: f } if f == funder.pubkey()
        ));
    }

    #[test]
    fn unconfirmed_creation_times_out() {
        let (ledger, funder) = flaky(Outcome::Unconfirmed);
        let nonce = Keypair::new();

        let err = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::ProvisioningTimeout { account, .. } if account == nonce.pubkey()
        ));
    }

    #[test]
    fn confirmed_creation_missing_on_requery_times_out() {
        let (ledger, funder) = flaky(Outcome::Lost);
        let nonce = Keypair::new();

        let err = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::ProvisioningTimeout { account, .. } if account == nonce.pubkey()
        ));
        assert_eq!(fetch(&ledger, &nonce.pubkey()).unwrap(), None);
    }

    #[test]
    fn advance_changes_the_stored_value() {
        let ledger = LocalLedger::new();
        let funder = funded(&ledger);
        let nonce = Keypair::new();
        let before = provision(&ledger, &nonce, &funder, &funder.pubkey()).unwrap();

        advance(&ledger, &nonce.pubkey(), &funder, &funder).unwrap();

        let after = fetch(&ledger, &nonce.pubkey()).unwrap().unwrap();
        assert_ne!(before.blockhash, after.blockhash);
    }
}
