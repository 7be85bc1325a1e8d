#![allow(dead_code)]

use cosign::{
    bundle::{Bundle, Operation},
    ledger::{Ledger, LocalLedger},
    nonce::{self, NonceInfo},
    signing::PendingTransaction,
    token,
};
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

pub const DECIMALS: u8 = 2;

pub fn funded(ledger: &LocalLedger, sol: u64) -> Keypair {
    let keypair = Keypair::new();
    ledger
        .request_airdrop(&keypair.pubkey(), sol * LAMPORTS_PER_SOL)
        .unwrap();
    keypair
}

/// Sender with tokens, a recipient who pays fees, and a nonce account the
/// sender controls
pub struct TransferSetup {
    pub ledger: LocalLedger,
    pub sender: Keypair,
    pub recipient: Keypair,
    pub nonce_keypair: Keypair,
    pub mint: Pubkey,
    pub sender_tokens: Pubkey,
    pub recipient_tokens: Pubkey,
}

impl TransferSetup {
    pub fn new(minted: u64) -> Self {
        let ledger = LocalLedger::new();
        let sender = funded(&ledger, 2);
        let recipient = funded(&ledger, 1);
        let nonce_keypair = Keypair::new();

        nonce::provision(&ledger, &nonce_keypair, &sender, &sender.pubkey()).unwrap();
        let mint =
            token::create_mint(&ledger, &sender, &Keypair::new(), &sender.pubkey(), DECIMALS)
                .unwrap();
        let sender_tokens = token::get_or_create_associated_token_account(
            &ledger,
            &sender,
            &mint,
            &sender.pubkey(),
        )
        .unwrap();
        let recipient_tokens = token::get_or_create_associated_token_account(
            &ledger,
            &sender,
            &mint,
            &recipient.pubkey(),
        )
        .unwrap();
        token::mint_to(
            &ledger,
            &sender,
            &mint,
            &sender_tokens,
            &sender.pubkey(),
            &[&sender],
            minted,
        )
        .unwrap();

        Self {
            ledger,
            sender,
            recipient,
            nonce_keypair,
            mint,
            sender_tokens,
            recipient_tokens,
        }
    }

    pub fn nonce(&self) -> NonceInfo {
        nonce::fetch(&self.ledger, &self.nonce_keypair.pubkey())
            .unwrap()
            .unwrap()
    }

    pub fn transfer_operation(&self, amount: u64) -> Operation {
        Operation::TokenTransferChecked {
            source: self.sender_tokens,
            mint: self.mint,
            destination: self.recipient_tokens,
            owner: self.sender.pubkey(),
            amount,
            decimals: DECIMALS,
        }
    }

    /// Unsigned `[advance nonce, transfer]` paid for by the recipient
    pub fn durable_transfer(&self, amount: u64) -> PendingTransaction {
        let nonce = self.nonce();
        let bundle = Bundle::durable(&nonce.account, &self.sender.pubkey())
            .push(self.transfer_operation(amount))
            .unwrap();
        PendingTransaction::new(&bundle, &self.recipient.pubkey(), nonce.blockhash)
    }

    /// Same transfer against the latest blockhash
    pub fn recent_transfer(&self, amount: u64) -> PendingTransaction {
        let bundle = Bundle::recent()
            .push(self.transfer_operation(amount))
            .unwrap();
        PendingTransaction::new(
            &bundle,
            &self.recipient.pubkey(),
            self.ledger.get_latest_blockhash().unwrap(),
        )
    }

    pub fn balances(&self) -> (u64, u64) {
        (
            token::token_balance(&self.ledger, &self.sender_tokens).unwrap(),
            token::token_balance(&self.ledger, &self.recipient_tokens).unwrap(),
        )
    }
}
