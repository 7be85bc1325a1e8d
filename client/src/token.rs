//! SPL token helpers: mints, multisig authorities, associated token accounts
//! and Metaplex metadata.

use mpl_token_metadata::{
    instructions::CreateV1Builder,
    types::{PrintSupply, TokenStandard},
};
use solana_sdk::{
    instruction::Instruction,
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
};
use spl_associated_token_account::get_associated_token_address;
use spl_token::state::{Account as TokenAccount, Mint, Multisig};
use tracing::info;

use crate::{
    bundle::Operation,
    error::{AssemblyError, Error, Result},
    ledger::{send_instructions, Ledger},
};

/// Create and initialize `mint` with no freeze authority
pub fn create_mint(
    ledger: &dyn Ledger,
    payer: &Keypair,
    mint: &Keypair,
    mint_authority: &Pubkey,
    decimals: u8,
) -> Result<Pubkey> {
    let rent = ledger.get_minimum_balance_for_rent_exemption(Mint::LEN)?;
    let instructions = [
        system_instruction::create_account(
            &payer.pubkey(),
            &mint.pubkey(),
            rent,
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint2(
            &spl_token::id(),
            &mint.pubkey(),
            mint_authority,
            None,
            decimals,
        )
        .map_err(|source| AssemblyError::InvalidOperation {
            operation: "initialize mint",
            source,
        })?,
    ];

    send_instructions(ledger, &instructions, &payer.pubkey(), &[payer, mint])?;
    info!("Created mint {} with {} decimals", mint.pubkey(), decimals);
    Ok(mint.pubkey())
}

/// Create an `m`-of-`members.len()` multisig authority
pub fn create_multisig(
    ledger: &dyn Ledger,
    payer: &Keypair,
    multisig: &Keypair,
    members: &[Pubkey],
    m: u8,
) -> Result<Pubkey> {
    let rent = ledger.get_minimum_balance_for_rent_exemption(Multisig::LEN)?;
    let member_refs: Vec<&Pubkey> = members.iter().collect();
    let instructions = [
        system_instruction::create_account(
            &payer.pubkey(),
            &multisig.pubkey(),
            rent,
            Multisig::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_multisig2(
            &spl_token::id(),
            &multisig.pubkey(),
            &member_refs,
            m,
        )
        .map_err(|source| AssemblyError::InvalidOperation {
            operation: "initialize multisig",
            source,
        })?,
    ];

    send_instructions(ledger, &instructions, &payer.pubkey(), &[payer, multisig])?;
    info!(
        "Created {}-of-{} multisig {}",
        m,
        members.len(),
        multisig.pubkey()
    );
    Ok(multisig.pubkey())
}

/// Address of `owner`'s associated token account for `mint`, created first
/// when missing
pub fn get_or_create_associated_token_account(
    ledger: &dyn Ledger,
    payer: &Keypair,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<Pubkey> {
    let address = get_associated_token_address(owner, mint);
    if ledger.get_account(&address)?.is_some() {
        return Ok(address);
    }

    let instruction = Operation::CreateAssociatedTokenAccount {
        funder: payer.pubkey(),
        wallet: *owner,
        mint: *mint,
    }
    .into_instruction()?;
    send_instructions(ledger, &[instruction], &payer.pubkey(), &[payer])?;
    info!("Created token account {} for {}", address, owner);
    Ok(address)
}

/// Mint `amount` base units. For a single mint authority pass its keypair
/// in `signers`; for a multisig authority pass the co-signing members.
pub fn mint_to(
    ledger: &dyn Ledger,
    payer: &Keypair,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    signers: &[&Keypair],
    amount: u64,
) -> Result<Signature> {
    let co_signers = signers
        .iter()
        .map(|signer| signer.pubkey())
        .filter(|pubkey| pubkey != authority)
        .collect();
    let instruction = Operation::MintTo {
        mint: *mint,
        destination: *destination,
        authority: *authority,
        co_signers,
        amount,
    }
    .into_instruction()?;

    let mut all_signers = vec![payer];
    all_signers.extend_from_slice(signers);
    let signature = send_instructions(ledger, &[instruction], &payer.pubkey(), &all_signers)?;
    info!("Minted {} of {} to {}", amount, mint, destination);
    Ok(signature)
}

/// Royalty recorded in created metadata, in basis points
pub const METADATA_SELLER_FEE_BASIS_POINTS: u16 = 500;

/// Metadata PDA of `mint` under the token metadata program
pub fn find_metadata_address(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[b"metadata", mpl_token_metadata::ID.as_ref(), mint.as_ref()],
        &mpl_token_metadata::ID,
    )
}

/// `CreateV1` for an existing fungible `mint`. `authority` is the mint
/// authority and becomes the update authority.
pub fn create_metadata_instruction(
    payer: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Instruction {
    let (metadata, _) = find_metadata_address(mint);
    CreateV1Builder::new()
        .metadata(metadata)
        .mint(*mint, false)
        .authority(*authority)
        .payer(*payer)
        .update_authority(*authority, true)
        .spl_token_program(Some(spl_token::id()))
        .is_mutable(true)
        .primary_sale_happened(false)
        .name(name.to_string())
        .symbol(symbol.to_string())
        .uri(uri.to_string())
        .seller_fee_basis_points(METADATA_SELLER_FEE_BASIS_POINTS)
        .token_standard(TokenStandard::Fungible)
        .print_supply(PrintSupply::Zero)
        .instruction()
}

/// Attach name, symbol and URI to `mint`. Returns the metadata address.
pub fn create_metadata(
    ledger: &dyn Ledger,
    payer: &Keypair,
    mint: &Pubkey,
    authority: &Keypair,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Result<Pubkey> {
    let instruction = create_metadata_instruction(
        &payer.pubkey(),
        mint,
        &authority.pubkey(),
        name,
        symbol,
        uri,
    );
    send_instructions(ledger, &[instruction], &payer.pubkey(), &[payer, authority])?;

    let (metadata, _) = find_metadata_address(mint);
    info!("Created metadata {} for {} ({})", metadata, mint, symbol);
    Ok(metadata)
}

pub fn token_account(ledger: &dyn Ledger, address: &Pubkey) -> Result<TokenAccount> {
    let account = ledger
        .get_account(address)?
        .ok_or_else(|| Error::InvalidAccount {
            account: *address,
            reason: "does not exist".to_string(),
        })?;
    if account.owner != spl_token::id() {
        return Err(Error::InvalidAccount {
            account: *address,
            reason: "not owned by the token program".to_string(),
        });
    }
    TokenAccount::unpack(&account.data).map_err(|err| Error::InvalidAccount {
        account: *address,
        reason: err.to_string(),
    })
}

/// Balance of a token account in base units
pub fn token_balance(ledger: &dyn Ledger, address: &Pubkey) -> Result<u64> {
    Ok(token_account(ledger, address)?.amount)
}

pub fn mint_decimals(ledger: &dyn Ledger, mint: &Pubkey) -> Result<u8> {
    let account = ledger
        .get_account(mint)?
        .ok_or_else(|| Error::InvalidAccount {
            account: *mint,
            reason: "does not exist".to_string(),
        })?;
    let state = Mint::unpack(&account.data).map_err(|err| Error::InvalidAccount {
        account: *mint,
        reason: err.to_string(),
    })?;
    Ok(state.decimals)
}
