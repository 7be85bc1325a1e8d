use solana_sdk::{
    instruction::InstructionError,
    program_error::ProgramError,
    pubkey::Pubkey,
    signature::Signature,
    signer::SignerError,
    transaction::TransactionError,
};
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("account {account} is not usable: {reason}")]
    InvalidAccount { account: Pubkey, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Missing or malformed process configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("{var} is malformed: {reason}")]
    Malformed { var: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("nonce account {account} is malformed: {reason}")]
    MalformedAccount { account: Pubkey, reason: String },

    #[error("creation of nonce account {account} not confirmed (transaction {signature})")]
    ProvisioningTimeout { account: Pubkey, signature: Signature },

    #[error("funder {funder} cannot cover the nonce account")]
    InsufficientFunds { funder: Pubkey },

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Submission(SubmissionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Raised while turning an operation into an instruction
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("invalid {operation} operation: {source}")]
    InvalidOperation {
        operation: &'static str,
        #[source]
        source: ProgramError,
    },
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("{0} is not a required signer of this transaction")]
    NotARequiredSigner(Pubkey),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Failures decoding a handed-off transaction. Always fatal to that bundle.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not a valid transaction: {0}")]
    WireFormat(#[from] bincode::Error),

    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("signature of {0} does not match the message")]
    SignatureMismatch(Pubkey),
}

/// Ledger verdicts on a submitted transaction. None of these are retried.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("insufficient funds: {0}")]
    InsufficientFunds(TransactionError),

    #[error("liveness reference is stale or was already consumed")]
    ExpiredOrReplayedAuthorization,

    #[error("transaction is missing required signatures")]
    IncompleteSignatures,

    #[error("transaction was already processed")]
    Duplicate,

    #[error("transaction {0} was sent but not confirmed")]
    Unconfirmed(Signature),

    #[error("transaction rejected: {0}")]
    Rejected(TransactionError),

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<TransactionError> for SubmissionError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::BlockhashNotFound => Self::ExpiredOrReplayedAuthorization,
            TransactionError::AlreadyProcessed => Self::Duplicate,
            TransactionError::SignatureFailure | TransactionError::MissingSignatureForFee => {
                Self::IncompleteSignatures
            }
            // a fee payer that was never credited
            TransactionError::AccountNotFound
            | TransactionError::InsufficientFundsForFee
            | TransactionError::InsufficientFundsForRent { .. }
            | TransactionError::InstructionError(_, InstructionError::InsufficientFunds)
            // token InsufficientFunds and system ResultWithNegativeLamports
            | TransactionError::InstructionError(_, InstructionError::Custom(1)) => {
                Self::InsufficientFunds(err)
            }
            other => Self::Rejected(other),
        }
    }
}

impl From<LedgerError> for SubmissionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(tx_err) => tx_err.into(),
            LedgerError::ConfirmationTimeout(signature, _) => Self::Unconfirmed(signature),
            other => Self::Ledger(other),
        }
    }
}

impl ProvisioningError {
    pub(crate) fn from_submission(err: SubmissionError, account: Pubkey, funder: Pubkey) -> Self {
        match err {
            SubmissionError::InsufficientFunds(_) => Self::InsufficientFunds { funder },
            SubmissionError::Unconfirmed(signature) => {
                Self::ProvisioningTimeout { account, signature }
            }
            other => Self::Submission(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stale_blockhash_is_expired_authorization() {
        let err = SubmissionError::from(TransactionError::BlockhashNotFound);
        assert!(matches!(err, SubmissionError::ExpiredOrReplayedAuthorization));
    }

    #[test]
    fn token_shortfall_is_insufficient_funds() {
        let err = SubmissionError::from(TransactionError::InstructionError(
            1,
            InstructionError::Custom(spl_token::error::TokenError::InsufficientFunds as u32),
        ));
        assert!(matches!(err, SubmissionError::InsufficientFunds(_)));
    }

    #[test]
    fn program_failure_is_rejected() {
        let err = SubmissionError::from(TransactionError::InstructionError(
            0,
            InstructionError::Custom(6000),
        ));
        assert!(matches!(err, SubmissionError::Rejected(_)));
    }

    #[test]
    fn confirmation_timeout_becomes_provisioning_timeout() {
        let signature = Signature::default();
        let submission = SubmissionError::from(LedgerError::ConfirmationTimeout(
            signature,
            Duration::from_secs(1),
        ));
        let err = ProvisioningError::from_submission(
            submission,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        );
        assert!(matches!(err, ProvisioningError::ProvisioningTimeout { .. }));
    }
}
