//! Multi-party signing of Solana transactions over durable nonces.
//!
//! The flow has four phases:
//! 1. [`nonce::provision`] makes sure a nonce account exists;
//! 2. a [`Bundle`] collects the operations, advance-nonce first;
//! 3. a [`PendingTransaction`] collects signatures from every party, with an
//!    [`encode`](PendingTransaction::encode) /
//!    [`decode`](PendingTransaction::decode) hand-off in between;
//! 4. [`PendingTransaction::submit`] hands it to a [`Ledger`] exactly once.

pub mod bundle;
pub mod config;
pub mod error;
pub mod explorer;
pub mod ledger;
pub mod nonce;
pub mod offer;
pub mod signing;
pub mod token;
pub mod wallet;

pub use bundle::{Bundle, Operation};
pub use error::{Error, Result};
pub use ledger::{Ledger, LocalLedger, RpcLedger};
pub use nonce::NonceInfo;
pub use signing::{PendingTransaction, SigningState};
