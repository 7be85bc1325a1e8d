//! Assemble, encode, decode: the unsigned content must come back unchanged.

use cosign::{
    bundle::{Bundle, Operation},
    signing::PendingTransaction,
};
use proptest::prelude::*;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

fn pubkey() -> impl Strategy<Value = Pubkey> {
    any::<[u8; 32]>().prop_map(Pubkey::new_from_array)
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (pubkey(), pubkey(), any::<u64>())
            .prop_map(|(from, to, lamports)| Operation::SolTransfer { from, to, lamports }),
        (pubkey(), pubkey(), pubkey(), any::<u64>()).prop_map(
            |(source, destination, owner, amount)| Operation::TokenTransfer {
                source,
                destination,
                owner,
                amount,
            }
        ),
        (pubkey(), pubkey(), pubkey(), pubkey(), any::<u64>(), 0u8..=9).prop_map(
            |(source, mint, destination, owner, amount, decimals)| {
                Operation::TokenTransferChecked {
                    source,
                    mint,
                    destination,
                    owner,
                    amount,
                    decimals,
                }
            }
        ),
        (pubkey(), pubkey(), pubkey(), prop::collection::vec(pubkey(), 0..3), any::<u64>())
            .prop_map(|(mint, destination, authority, co_signers, amount)| {
                Operation::MintTo {
                    mint,
                    destination,
                    authority,
                    co_signers,
                    amount,
                }
            }),
        (pubkey(), pubkey(), pubkey()).prop_map(|(funder, wallet, mint)| {
            Operation::CreateAssociatedTokenAccount {
                funder,
                wallet,
                mint,
            }
        }),
    ]
}

fn assemble(durable: Option<(Pubkey, Pubkey)>, operations: Vec<Operation>) -> Bundle {
    let bundle = match durable {
        Some((nonce, authority)) => Bundle::durable(&nonce, &authority),
        None => Bundle::recent(),
    };
    operations
        .into_iter()
        .try_fold(bundle, Bundle::push)
        .unwrap()
}

proptest! {
    #[test]
    fn unsigned_content_survives_transport(
        durable in proptest::option::of((pubkey(), pubkey())),
        operations in prop::collection::vec(operation(), 1..5),
        fee_payer in pubkey(),
        liveness in any::<[u8; 32]>().prop_map(Hash::new_from_array),
    ) {
        let bundle = assemble(durable, operations);
        let pending = PendingTransaction::new(&bundle, &fee_payer, liveness);

        let decoded = PendingTransaction::decode(&pending.encode().unwrap()).unwrap();

        prop_assert_eq!(decoded.message_bytes(), pending.message_bytes());
        prop_assert_eq!(
            &decoded.transaction().message.instructions,
            &pending.transaction().message.instructions
        );
        prop_assert_eq!(decoded.liveness(), liveness);
        prop_assert_eq!(decoded.fee_payer(), fee_payer);
    }

    #[test]
    fn partial_signatures_survive_transport(
        recipients in prop::collection::vec(pubkey(), 1..4),
        lamports in any::<u64>(),
        liveness in any::<[u8; 32]>().prop_map(Hash::new_from_array),
    ) {
        let sender = Keypair::new();
        let fee_payer = Keypair::new();
        let operations = recipients
            .into_iter()
            .map(|to| Operation::SolTransfer {
                from: sender.pubkey(),
                to,
                lamports,
            })
            .collect();
        let bundle = assemble(None, operations);
        let mut pending = PendingTransaction::new(&bundle, &fee_payer.pubkey(), liveness);
        pending.sign(&sender).unwrap();

        let decoded = PendingTransaction::decode(&pending.encode().unwrap()).unwrap();

        prop_assert_eq!(&decoded, &pending);
    }
}
