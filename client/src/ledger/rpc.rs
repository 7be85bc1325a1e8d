use std::{
    thread,
    time::{Duration, Instant},
};

use solana_client::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use super::{Ledger, LedgerError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Cluster-backed ledger using a blocking RPC client at confirmed commitment
pub struct RpcLedger {
    client: RpcClient,
    confirm_timeout: Duration,
}

impl RpcLedger {
    pub fn new(rpc_url: impl ToString, confirm_timeout: Duration) -> Self {
        let client =
            RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());
        info!("RPC ledger at {}", client.url());
        Self {
            client,
            confirm_timeout,
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    fn wait_for_confirmation(&self, signature: &Signature) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.client.get_signature_status(signature)? {
                Some(Ok(())) => return Ok(()),
                Some(Err(err)) => return Err(LedgerError::Rejected(err)),
                None if Instant::now() >= deadline => {
                    warn!("Transaction {} not confirmed in time", signature);
                    return Err(LedgerError::ConfirmationTimeout(
                        *signature,
                        self.confirm_timeout,
                    ));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

impl Ledger for RpcLedger {
    fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(pubkey, self.client.commitment())?;
        Ok(response.value)
    }

    fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, LedgerError> {
        Ok(self.client.get_balance(pubkey)?)
    }

    fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64, LedgerError> {
        Ok(self.client.get_minimum_balance_for_rent_exemption(data_len)?)
    }

    fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        Ok(self.client.get_latest_blockhash()?)
    }

    fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        let signature = self.client.send_transaction(transaction)?;
        debug!("Sent transaction {}", signature);
        self.wait_for_confirmation(&signature)?;
        Ok(signature)
    }

    fn request_airdrop(&self, pubkey: &Pubkey, lamports: u64) -> Result<Signature, LedgerError> {
        let signature = self.client.request_airdrop(pubkey, lamports)?;
        self.wait_for_confirmation(&signature)?;
        Ok(signature)
    }
}
