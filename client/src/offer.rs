//! Client side of the `offer_escrow` program.

use anchor_lang::{AccountDeserialize, InstructionData, ToAccountMetas};
use offer_escrow::state::Offer;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_program};
use spl_associated_token_account::get_associated_token_address;

use crate::{
    error::{Error, Result},
    ledger::Ledger,
};

/// Offer PDA and bump for `maker`'s offer `id`
pub fn find_offer_address(maker: &Pubkey, id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[Offer::PREFIX_SEED, maker.as_ref(), &id.to_le_bytes()],
        &offer_escrow::ID,
    )
}

pub fn make_offer_instruction(
    maker: &Pubkey,
    token_mint_a: &Pubkey,
    token_mint_b: &Pubkey,
    id: u64,
    token_a_offered_amount: u64,
    token_b_wanted_amount: u64,
) -> Instruction {
    let (offer, _) = find_offer_address(maker, id);
    let accounts = offer_escrow::accounts::MakeOffer {
        maker: *maker,
        token_mint_a: *token_mint_a,
        token_mint_b: *token_mint_b,
        maker_token_account_a: get_associated_token_address(maker, token_mint_a),
        offer,
        associated_token_program: spl_associated_token_account::id(),
        token_program: spl_token::id(),
        system_program: system_program::id(),
    };

    Instruction {
        program_id: offer_escrow::ID,
        accounts: accounts.to_account_metas(None),
        data: offer_escrow::instruction::MakeOffer {
            id,
            token_a_offered_amount,
            token_b_wanted_amount,
        }
        .data(),
    }
}

/// Accept `offer` as `taker`. Creates the taker's token-A account and the
/// maker's token-B account when they are missing.
pub fn take_offer_instruction(taker: &Pubkey, offer: &Offer) -> Instruction {
    let (address, _) = find_offer_address(&offer.maker, offer.id);
    let accounts = offer_escrow::accounts::TakeOffer {
        taker: *taker,
        maker: offer.maker,
        token_mint_a: offer.token_mint_a,
        token_mint_b: offer.token_mint_b,
        maker_token_account_a: get_associated_token_address(&offer.maker, &offer.token_mint_a),
        taker_token_account_a: get_associated_token_address(taker, &offer.token_mint_a),
        taker_token_account_b: get_associated_token_address(taker, &offer.token_mint_b),
        maker_token_account_b: get_associated_token_address(&offer.maker, &offer.token_mint_b),
        offer: address,
        associated_token_program: spl_associated_token_account::id(),
        token_program: spl_token::id(),
        system_program: system_program::id(),
    };

    Instruction {
        program_id: offer_escrow::ID,
        accounts: accounts.to_account_metas(None),
        data: offer_escrow::instruction::TakeOffer {}.data(),
    }
}

/// `None` once the offer has been taken and closed
pub fn fetch_offer(ledger: &dyn Ledger, address: &Pubkey) -> Result<Option<Offer>> {
    let Some(account) = ledger.get_account(address)? else {
        return Ok(None);
    };
    if account.owner != offer_escrow::ID {
        return Err(Error::InvalidAccount {
            account: *address,
            reason: "not owned by the offer program".to_string(),
        });
    }
    let offer =
        Offer::try_deserialize(&mut account.data.as_slice()).map_err(|err| Error::InvalidAccount {
            account: *address,
            reason: err.to_string(),
        })?;
    Ok(Some(offer))
}
