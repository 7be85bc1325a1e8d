//! Instruction assembly.
//!
//! A [`Bundle`] is the ordered instruction list of one transaction. Durable
//! bundles always carry the advance-nonce instruction at index 0, which the
//! ledger requires before it accepts a stored nonce in place of a recent
//! blockhash.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use crate::error::AssemblyError;

/// One unit of work inside a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SolTransfer {
        from: Pubkey,
        to: Pubkey,
        lamports: u64,
    },
    /// Unchecked SPL transfer between token accounts
    TokenTransfer {
        source: Pubkey,
        destination: Pubkey,
        owner: Pubkey,
        amount: u64,
    },
    TokenTransferChecked {
        source: Pubkey,
        mint: Pubkey,
        destination: Pubkey,
        owner: Pubkey,
        amount: u64,
        decimals: u8,
    },
    /// `co_signers` is empty for a single mint authority and lists the
    /// signing members when the authority is a multisig
    MintTo {
        mint: Pubkey,
        destination: Pubkey,
        authority: Pubkey,
        co_signers: Vec<Pubkey>,
        amount: u64,
    },
    CreateAssociatedTokenAccount {
        funder: Pubkey,
        wallet: Pubkey,
        mint: Pubkey,
    },
    Raw(Instruction),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::SolTransfer { .. } => "sol transfer",
            Operation::TokenTransfer { .. } => "token transfer",
            Operation::TokenTransferChecked { .. } => "checked token transfer",
            Operation::MintTo { .. } => "mint-to",
            Operation::CreateAssociatedTokenAccount { .. } => "associated token account",
            Operation::Raw(_) => "raw",
        }
    }

    pub fn into_instruction(self) -> Result<Instruction, AssemblyError> {
        let operation = self.name();
        let invalid = |source| AssemblyError::InvalidOperation { operation, source };

        match self {
            Operation::SolTransfer { from, to, lamports } => {
                Ok(system_instruction::transfer(&from, &to, lamports))
            }
            Operation::TokenTransfer {
                source,
                destination,
                owner,
                amount,
            } => spl_token::instruction::transfer(
                &spl_token::id(),
                &source,
                &destination,
                &owner,
                &[],
                amount,
            )
            .map_err(invalid),
            Operation::TokenTransferChecked {
                source,
                mint,
                destination,
                owner,
                amount,
                decimals,
            } => spl_token::instruction::transfer_checked(
                &spl_token::id(),
                &source,
                &mint,
                &destination,
                &owner,
                &[],
                amount,
                decimals,
            )
            .map_err(invalid),
            Operation::MintTo {
                mint,
                destination,
                authority,
                co_signers,
                amount,
            } => {
                let co_signers: Vec<&Pubkey> = co_signers.iter().collect();
                spl_token::instruction::mint_to(
                    &spl_token::id(),
                    &mint,
                    &destination,
                    &authority,
                    &co_signers,
                    amount,
                )
                .map_err(invalid)
            }
            Operation::CreateAssociatedTokenAccount {
                funder,
                wallet,
                mint,
            } => Ok(create_associated_token_account_idempotent(
                &funder,
                &wallet,
                &mint,
                &spl_token::id(),
            )),
            Operation::Raw(instruction) => Ok(instruction),
        }
    }
}

/// Ordered, append-only list of instructions for one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    instructions: Vec<Instruction>,
    nonce_account: Option<Pubkey>,
}

impl Bundle {
    /// Bundle to be signed against the nonce stored in `nonce_account`.
    /// `nonce_authority` must sign it.
    pub fn durable(nonce_account: &Pubkey, nonce_authority: &Pubkey) -> Self {
        Self {
            instructions: vec![system_instruction::advance_nonce_account(
                nonce_account,
                nonce_authority,
            )],
            nonce_account: Some(*nonce_account),
        }
    }

    /// Bundle to be signed against a recent blockhash
    pub fn recent() -> Self {
        Self::default()
    }

    pub fn push(mut self, operation: Operation) -> Result<Self, AssemblyError> {
        self.instructions.push(operation.into_instruction()?);
        Ok(self)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn nonce_account(&self) -> Option<&Pubkey> {
        self.nonce_account.as_ref()
    }

    pub fn is_durable(&self) -> bool {
        self.nonce_account.is_some()
    }
}
