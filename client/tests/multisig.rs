//! Minting under a 2-of-3 multisig mint authority.

mod common;

use common::funded;
use cosign::{
    bundle::{Bundle, Operation},
    error::{Error, SubmissionError},
    ledger::{Ledger, LocalLedger},
    signing::{PendingTransaction, SigningState},
    token,
};
use solana_sdk::{
    instruction::InstructionError,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::TransactionError,
};

struct Committee {
    ledger: LocalLedger,
    members: [Keypair; 3],
    multisig: Pubkey,
    mint: Pubkey,
    destination: Pubkey,
}

fn committee() -> Committee {
    let ledger = LocalLedger::new();
    let members = [funded(&ledger, 1), funded(&ledger, 1), funded(&ledger, 1)];
    let pubkeys: Vec<Pubkey> = members.iter().map(|member| member.pubkey()).collect();
    let payer = &members[0];

    let multisig = token::create_multisig(&ledger, payer, &Keypair::new(), &pubkeys, 2).unwrap();
    let mint = token::create_mint(&ledger, payer, &Keypair::new(), &multisig, 2).unwrap();
    let destination =
        token::get_or_create_associated_token_account(&ledger, payer, &mint, &payer.pubkey())
            .unwrap();

    Committee {
        ledger,
        members,
        multisig,
        mint,
        destination,
    }
}

fn missing_signature(err: Error) -> bool {
    matches!(
        err,
        Error::Submission(SubmissionError::Rejected(TransactionError::InstructionError(
            0,
            InstructionError::MissingRequiredSignature
        )))
    )
}

#[test]
fn two_members_can_mint() {
    let c = committee();
    let [payer, second, third] = &c.members;

    token::mint_to(
        &c.ledger,
        payer,
        &c.mint,
        &c.destination,
        &c.multisig,
        &[second, third],
        10_000,
    )
    .unwrap();

    assert_eq!(token::token_balance(&c.ledger, &c.destination).unwrap(), 10_000);
}

#[test]
fn one_member_cannot_mint() {
    let c = committee();
    let [payer, second, _] = &c.members;

    // the fee payer is a member too, but only listed co-signers count
    let err = token::mint_to(
        &c.ledger,
        payer,
        &c.mint,
        &c.destination,
        &c.multisig,
        &[second],
        10_000,
    )
    .unwrap_err();

    assert!(missing_signature(err));
    assert_eq!(token::token_balance(&c.ledger, &c.destination).unwrap(), 0);
}

#[test]
fn outsiders_do_not_count_towards_the_threshold() {
    let c = committee();
    let [payer, second, _] = &c.members;
    let outsider = funded(&c.ledger, 1);

    let err = token::mint_to(
        &c.ledger,
        payer,
        &c.mint,
        &c.destination,
        &c.multisig,
        &[second, &outsider],
        10_000,
    )
    .unwrap_err();

    assert!(missing_signature(err));
}

#[test]
fn members_sign_one_at_a_time() {
    let c = committee();
    let [payer, second, third] = &c.members;
    let bundle = Bundle::recent()
        .push(Operation::MintTo {
            mint: c.mint,
            destination: c.destination,
            authority: c.multisig,
            co_signers: vec![second.pubkey(), third.pubkey()],
            amount: 250,
        })
        .unwrap();
    let mut pending = PendingTransaction::new(
        &bundle,
        &payer.pubkey(),
        c.ledger.get_latest_blockhash().unwrap(),
    );

    pending.sign(third).unwrap();
    let mut handed_off = PendingTransaction::decode(&pending.encode().unwrap()).unwrap();
    assert!(matches!(
        handed_off.sign(payer).unwrap(),
        SigningState::PartiallySigned { missing } if missing == vec![second.pubkey()]
    ));
    assert_eq!(handed_off.sign(second).unwrap(), SigningState::FullySigned);
    handed_off.submit(&c.ledger).unwrap();

    assert_eq!(token::token_balance(&c.ledger, &c.destination).unwrap(), 250);
}
