//! Staged multi-party signing.
//!
//! The message is compiled once, when the pending transaction is created.
//! Each party then signs those exact bytes, possibly in another process after
//! an [`encode`](PendingTransaction::encode) /
//! [`decode`](PendingTransaction::decode) hand-off. Signatures only ever
//! accumulate and the message is never touched again.

use base64::{engine::general_purpose::STANDARD, Engine};
use solana_sdk::{
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    sanitize::Sanitize,
    signature::{Signature, Signer},
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use crate::{
    bundle::Bundle,
    error::{SigningError, SubmissionError, TransportError},
    ledger::Ledger,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    PartiallySigned { missing: Vec<Pubkey> },
    FullySigned,
}

/// A transaction collecting signatures from its required signers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    transaction: Transaction,
}

impl PendingTransaction {
    /// Compile `bundle` with `fee_payer` as the first required signer.
    /// `liveness` is the stored nonce for a durable bundle, otherwise a
    /// recent blockhash.
    pub fn new(bundle: &Bundle, fee_payer: &Pubkey, liveness: Hash) -> Self {
        let message =
            Message::new_with_blockhash(bundle.instructions(), Some(fee_payer), &liveness);
        Self {
            transaction: Transaction::new_unsigned(message),
        }
    }

    /// Add `party`'s signature over the message. Required signers may sign in
    /// any order and signing twice is harmless.
    pub fn sign(&mut self, party: &dyn Signer) -> Result<SigningState, SigningError> {
        let pubkey = party.try_pubkey()?;
        if !self.required_signers().contains(&pubkey) {
            return Err(SigningError::NotARequiredSigner(pubkey));
        }

        let liveness = self.liveness();
        let signers: Vec<&dyn Signer> = vec![party];
        self.transaction.try_partial_sign(&signers, liveness)?;
        debug!("{} signed", pubkey);
        Ok(self.state())
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        let message = &self.transaction.message;
        &message.account_keys[..message.header.num_required_signatures as usize]
    }

    pub fn state(&self) -> SigningState {
        let required = self.required_signers();
        let missing: Vec<Pubkey> = required
            .iter()
            .zip(&self.transaction.signatures)
            .filter(|(_, signature)| **signature == Signature::default())
            .map(|(pubkey, _)| *pubkey)
            .collect();

        if missing.is_empty() {
            SigningState::FullySigned
        } else if missing.len() == required.len() {
            SigningState::Unsigned
        } else {
            SigningState::PartiallySigned { missing }
        }
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.transaction.message.account_keys[0]
    }

    /// Blockhash or durable nonce the message was compiled with
    pub fn liveness(&self) -> Hash {
        self.transaction.message.recent_blockhash
    }

    /// The bytes every party signs
    pub fn message_bytes(&self) -> Vec<u8> {
        self.transaction.message_data()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Wire-format transaction, base64 encoded
    pub fn encode(&self) -> Result<String, TransportError> {
        let bytes = bincode::serialize(&self.transaction)?;
        Ok(STANDARD.encode(bytes))
    }

    /// Inverse of [`encode`](Self::encode). Rejects anything that is not a
    /// well-formed transaction, and any present signature that does not
    /// verify, so a message altered in transit is caught before signing.
    pub fn decode(encoded: &str) -> Result<Self, TransportError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let transaction: Transaction = bincode::deserialize(&bytes)?;
        transaction
            .sanitize()
            .map_err(|err| TransportError::Malformed(err.to_string()))?;
        if bincode::serialize(&transaction)? != bytes {
            return Err(TransportError::Malformed(
                "trailing or non-canonical bytes".to_string(),
            ));
        }

        let message_bytes = transaction.message_data();
        for (signature, pubkey) in transaction
            .signatures
            .iter()
            .zip(&transaction.message.account_keys)
        {
            if *signature != Signature::default()
                && !signature.verify(pubkey.as_ref(), &message_bytes)
            {
                return Err(TransportError::SignatureMismatch(*pubkey));
            }
        }

        Ok(Self { transaction })
    }

    /// Submit once. The ledger's verdict is final: nothing is retried, and
    /// the pending transaction is consumed either way.
    pub fn submit(self, ledger: &dyn Ledger) -> Result<Signature, SubmissionError> {
        match self.state() {
            SigningState::FullySigned => {}
            SigningState::PartiallySigned { missing } => {
                warn!("Submitting without signatures of {:?}", missing)
            }
            SigningState::Unsigned => warn!("Submitting an unsigned transaction"),
        }
        let signature = ledger.send_and_confirm_transaction(&self.transaction)?;
        info!("Transaction {} confirmed", signature);
        Ok(signature)
    }
}
