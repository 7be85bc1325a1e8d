use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::{debug, info};

use crate::{
    bundle::Operation,
    error::{ConfigError, Result},
    ledger::{send_instructions, Ledger},
};

pub fn generate_keypair() -> Keypair {
    Keypair::new()
}

/// Parse a secret key stored as a JSON array of 64 bytes, the format of
/// `solana-keygen` key files. `var` names the source in errors.
pub fn parse_secret_key(var: &str, raw: &str) -> Result<Keypair, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed {
        var: var.to_string(),
        reason,
    };
    let bytes: Vec<u8> =
        serde_json::from_str(raw.trim()).map_err(|err| malformed(err.to_string()))?;
    Keypair::from_bytes(&bytes).map_err(|err| malformed(err.to_string()))
}

/// Inverse of [`parse_secret_key`]
pub fn secret_key_json(keypair: &Keypair) -> String {
    let bytes = keypair.to_bytes();
    serde_json::Value::from(bytes.to_vec()).to_string()
}

pub fn balance(ledger: &dyn Ledger, pubkey: &Pubkey) -> Result<u64> {
    Ok(ledger.get_balance(pubkey)?)
}

pub fn send_sol(
    ledger: &dyn Ledger,
    from: &Keypair,
    to: &Pubkey,
    lamports: u64,
) -> Result<Signature> {
    let instruction = Operation::SolTransfer {
        from: from.pubkey(),
        to: *to,
        lamports,
    }
    .into_instruction()?;
    let signature = send_instructions(ledger, &[instruction], &from.pubkey(), &[from])?;
    info!(
        "Sent {} SOL from {} to {}",
        lamports as f64 / LAMPORTS_PER_SOL as f64,
        from.pubkey(),
        to
    );
    Ok(signature)
}

/// Request `amount` lamports when the balance is below `minimum`. Returns the
/// balance afterwards.
pub fn airdrop_if_required(
    ledger: &dyn Ledger,
    pubkey: &Pubkey,
    amount: u64,
    minimum: u64,
) -> Result<u64> {
    let current = ledger.get_balance(pubkey)?;
    if current >= minimum {
        debug!("{} already holds {} lamports", pubkey, current);
        return Ok(current);
    }
    ledger.request_airdrop(pubkey, amount)?;
    Ok(ledger.get_balance(pubkey)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LocalLedger;

    #[test]
    fn secret_key_round_trips_through_json() {
        let keypair = generate_keypair();
        let parsed = parse_secret_key("SECRET_KEY", &secret_key_json(&keypair)).unwrap();
        assert_eq!(parsed.pubkey(), keypair.pubkey());
    }

    #[test]
    fn short_secret_key_is_malformed() {
        let err = parse_secret_key("SECRET_KEY", "[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { var, .. } if var == "SECRET_KEY"));
    }

    #[test]
    fn airdrop_only_below_minimum() {
        let ledger = LocalLedger::new();
        let wallet = Pubkey::new_unique();

        let minimum = LAMPORTS_PER_SOL / 2;
        let first = airdrop_if_required(&ledger, &wallet, LAMPORTS_PER_SOL, minimum).unwrap();
        let second = airdrop_if_required(&ledger, &wallet, LAMPORTS_PER_SOL, minimum).unwrap();

        assert_eq!(first, LAMPORTS_PER_SOL);
        assert_eq!(second, LAMPORTS_PER_SOL);
    }

    #[test]
    fn send_sol_charges_sender() {
        let ledger = LocalLedger::new();
        let from = generate_keypair();
        let to = Pubkey::new_unique();
        ledger.request_airdrop(&from.pubkey(), LAMPORTS_PER_SOL).unwrap();

        send_sol(&ledger, &from, &to, 1_000_000).unwrap();

        assert_eq!(balance(&ledger, &to).unwrap(), 1_000_000);
        assert_eq!(
            balance(&ledger, &from.pubkey()).unwrap(),
            LAMPORTS_PER_SOL - 1_000_000 - crate::ledger::LAMPORTS_PER_SIGNATURE
        );
    }
}
