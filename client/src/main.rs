use std::{thread, time::Duration};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use cosign::{
    bundle::{Bundle, Operation},
    config::{self, Config},
    explorer,
    ledger::{Ledger, RpcLedger},
    nonce, offer,
    signing::{PendingTransaction, SigningState},
    token, wallet,
};
use solana_sdk::{
    native_token::{lamports_to_sol, sol_to_lamports},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cosign", version, about = "Durable-nonce multi-party signing for Solana")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(long, env = "RPC_URL", default_value = config::DEFAULT_RPC_URL, global = true)]
    rpc_url: String,

    /// Seconds to wait for a submitted transaction to confirm
    #[arg(
        long,
        env = "CONFIRM_TIMEOUT_SECS",
        default_value_t = config::DEFAULT_CONFIRM_TIMEOUT_SECS,
        global = true
    )]
    confirm_timeout_secs: u64,

    /// Pause between the two signatures of `nonce-transfer`
    #[arg(
        long,
        env = "HANDOFF_DELAY_SECS",
        default_value_t = config::DEFAULT_HANDOFF_DELAY_SECS,
        global = true
    )]
    handoff_delay_secs: u64,
}

impl From<&GlobalArgs> for Config {
    fn from(args: &GlobalArgs) -> Self {
        Config {
            rpc_url: args.rpc_url.clone(),
            confirm_timeout: Duration::from_secs(args.confirm_timeout_secs),
            handoff_delay: Duration::from_secs(args.handoff_delay_secs),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a keypair and print it in `.env` format
    Keygen,
    /// SOL balance of an address, `SECRET_KEY` by default
    Balance {
        #[arg(long)]
        address: Option<Pubkey>,
    },
    /// Airdrop SOL to `SECRET_KEY` when its balance is low
    Airdrop {
        #[arg(long, default_value_t = 1.0)]
        sol: f64,
    },
    /// Send SOL from `SECRET_KEY`
    SendSol {
        #[arg(long)]
        to: Pubkey,
        #[arg(long)]
        sol: f64,
    },
    /// Create a mint with `SECRET_KEY` as mint authority
    CreateMint {
        #[arg(long, default_value_t = 2)]
        decimals: u8,
    },
    /// Attach Metaplex metadata to a mint whose authority is `SECRET_KEY`
    CreateMetadata {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        uri: String,
    },
    /// Create a 2-of-3 multisig from the three secret keys, a mint it
    /// controls, and mint to `SECRET_KEY` with two co-signers
    MultisigMint {
        #[arg(long, default_value_t = 100)]
        amount: u64,
    },
    /// Create the nonce account `NONCE_ACCOUNT_KEY` if it does not exist
    NonceInit,
    /// Advance the nonce, invalidating outstanding bundles
    NonceAdvance,
    /// Sender side: build and sign a durable token transfer to
    /// `SECRET_KEY2`, who pays the fee, and print it
    NonceSign(TransferArgs),
    /// Recipient side: sign a printed transaction and submit it
    NonceSubmit {
        #[arg(long)]
        transaction: String,
    },
    /// Both sides in one process, with the hand-off delay in between
    NonceTransfer(TransferArgs),
    /// Same two-party transfer against a recent blockhash instead of a nonce
    PayRecipient(TransferArgs),
    /// Offer `offered` of mint A for `wanted` of mint B as `SECRET_KEY`
    MakeOffer {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        mint_a: Pubkey,
        #[arg(long)]
        mint_b: Pubkey,
        #[arg(long)]
        offered: u64,
        #[arg(long)]
        wanted: u64,
    },
    /// Accept an offer as `SECRET_KEY2`
    TakeOffer {
        #[arg(long)]
        maker: Pubkey,
        #[arg(long)]
        id: u64,
    },
}

#[derive(Args, Debug)]
struct TransferArgs {
    #[arg(long)]
    mint: Pubkey,
    /// Amount in base units
    #[arg(long, default_value_t = 2700)]
    amount: u64,
}

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cosign=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from(&cli.global);
    let ledger = RpcLedger::new(&config.rpc_url, config.confirm_timeout);
    run(cli.command, &ledger, &config)
}

fn sender() -> anyhow::Result<Keypair> {
    Ok(config::keypair_from_env(config::SECRET_KEY)?)
}

fn recipient() -> anyhow::Result<Keypair> {
    Ok(config::keypair_from_env(config::SECRET_KEY2)?)
}

fn run(command: Command, ledger: &dyn Ledger, config: &Config) -> anyhow::Result<()> {
    let rpc_url = config.rpc_url.as_str();
    match command {
        Command::Keygen => {
            let keypair = wallet::generate_keypair();
            println!("# {}", keypair.pubkey());
            println!("SECRET_KEY={}", wallet::secret_key_json(&keypair));
        }
        Command::Balance { address } => {
            let address = match address {
                Some(address) => address,
                None => sender()?.pubkey(),
            };
            let lamports = wallet::balance(ledger, &address)?;
            println!("{} holds {} SOL", address, lamports_to_sol(lamports));
        }
        Command::Airdrop { sol } => {
            let payer = sender()?;
            let lamports = sol_to_lamports(sol);
            let balance =
                wallet::airdrop_if_required(ledger, &payer.pubkey(), lamports, lamports / 2)?;
            println!("{} holds {} SOL", payer.pubkey(), lamports_to_sol(balance));
        }
        Command::SendSol { to, sol } => {
            let from = sender()?;
            let signature = wallet::send_sol(ledger, &from, &to, sol_to_lamports(sol))?;
            println!("{}", explorer::transaction_link(&signature, rpc_url));
        }
        Command::CreateMint { decimals } => {
            let payer = sender()?;
            let mint =
                token::create_mint(ledger, &payer, &Keypair::new(), &payer.pubkey(), decimals)?;
            println!("{}", explorer::address_link(&mint, rpc_url));
        }
        Command::CreateMetadata {
            mint,
            name,
            symbol,
            uri,
        } => {
            let payer = sender()?;
            let metadata =
                token::create_metadata(ledger, &payer, &mint, &payer, &name, &symbol, &uri)?;
            println!("{}", explorer::address_link(&metadata, rpc_url));
        }
        Command::MultisigMint { amount } => multisig_mint(ledger, rpc_url, amount)?,
        Command::NonceInit => {
            let funder = sender()?;
            let nonce_keypair = config::keypair_from_env(config::NONCE_ACCOUNT_KEY)?;
            let info = nonce::provision(ledger, &nonce_keypair, &funder, &funder.pubkey())?;
            println!("Nonce account {} holds {}", info.account, info.blockhash);
        }
        Command::NonceAdvance => {
            let authority = sender()?;
            let nonce_keypair = config::keypair_from_env(config::NONCE_ACCOUNT_KEY)?;
            let signature =
                nonce::advance(ledger, &nonce_keypair.pubkey(), &authority, &authority)?;
            println!("{}", explorer::transaction_link(&signature, rpc_url));
        }
        Command::NonceSign(args) => {
            let pending = sign_durable_transfer(ledger, &args)?;
            println!("{}", pending.encode()?);
        }
        Command::NonceSubmit { transaction } => {
            let pending = PendingTransaction::decode(&transaction)?;
            countersign_and_submit(ledger, rpc_url, pending)?;
        }
        Command::NonceTransfer(args) => {
            let encoded = sign_durable_transfer(ledger, &args)?.encode()?;
            println!("{}", encoded);
            info!("Waiting {:?} before the recipient signs", config.handoff_delay);
            thread::sleep(config.handoff_delay);
            countersign_and_submit(ledger, rpc_url, PendingTransaction::decode(&encoded)?)?;
        }
        Command::PayRecipient(args) => {
            let sender = sender()?;
            let recipient = recipient()?;
            let bundle = transfer_bundle(ledger, Bundle::recent(), &sender, &recipient, &args)?;
            let blockhash = ledger.get_latest_blockhash()?;
            let mut pending = PendingTransaction::new(&bundle, &recipient.pubkey(), blockhash);
            pending.sign(&sender)?;
            let encoded = pending.encode()?;
            println!("{}", encoded);
            countersign_and_submit(ledger, rpc_url, PendingTransaction::decode(&encoded)?)?;
        }
        Command::MakeOffer {
            id,
            mint_a,
            mint_b,
            offered,
            wanted,
        } => {
            let maker = sender()?;
            let instruction = offer::make_offer_instruction(
                &maker.pubkey(),
                &mint_a,
                &mint_b,
                id,
                offered,
                wanted,
            );
            let signature = cosign::ledger::send_instructions(
                ledger,
                &[instruction],
                &maker.pubkey(),
                &[&maker],
            )?;
            let (address, _) = offer::find_offer_address(&maker.pubkey(), id);
            println!("Offer {}: {}", address, explorer::transaction_link(&signature, rpc_url));
        }
        Command::TakeOffer { maker, id } => {
            let taker = recipient()?;
            let (address, _) = offer::find_offer_address(&maker, id);
            let Some(terms) = offer::fetch_offer(ledger, &address)? else {
                bail!("offer {} does not exist or was already taken", address);
            };
            let instruction = offer::take_offer_instruction(&taker.pubkey(), &terms);
            let signature = cosign::ledger::send_instructions(
                ledger,
                &[instruction],
                &taker.pubkey(),
                &[&taker],
            )?;
            println!("{}", explorer::transaction_link(&signature, rpc_url));
        }
    }
    Ok(())
}

/// Ensure both token accounts exist and mint `args.amount` to the sender,
/// then append the checked transfer to `bundle`
fn transfer_bundle(
    ledger: &dyn Ledger,
    bundle: Bundle,
    sender: &Keypair,
    recipient: &Keypair,
    args: &TransferArgs,
) -> anyhow::Result<Bundle> {
    let source = token::get_or_create_associated_token_account(
        ledger,
        sender,
        &args.mint,
        &sender.pubkey(),
    )?;
    let destination = token::get_or_create_associated_token_account(
        ledger,
        sender,
        &args.mint,
        &recipient.pubkey(),
    )?;
    token::mint_to(
        ledger,
        sender,
        &args.mint,
        &source,
        &sender.pubkey(),
        &[sender],
        args.amount,
    )
    .context("minting the transfer amount to the sender")?;

    let decimals = token::mint_decimals(ledger, &args.mint)?;
    Ok(bundle.push(Operation::TokenTransferChecked {
        source,
        mint: args.mint,
        destination,
        owner: sender.pubkey(),
        amount: args.amount,
        decimals,
    })?)
}

fn sign_durable_transfer(
    ledger: &dyn Ledger,
    args: &TransferArgs,
) -> anyhow::Result<PendingTransaction> {
    let sender = sender()?;
    let recipient = recipient()?;
    let nonce_keypair = config::keypair_from_env(config::NONCE_ACCOUNT_KEY)?;

    let nonce = nonce::provision(ledger, &nonce_keypair, &sender, &sender.pubkey())?;
    info!("Signing against nonce {} of {}", nonce.blockhash, nonce.account);

    let bundle = transfer_bundle(
        ledger,
        Bundle::durable(&nonce.account, &sender.pubkey()),
        &sender,
        &recipient,
        args,
    )?;
    let mut pending = PendingTransaction::new(&bundle, &recipient.pubkey(), nonce.blockhash);
    pending.sign(&sender)?;
    Ok(pending)
}

fn countersign_and_submit(
    ledger: &dyn Ledger,
    rpc_url: &str,
    mut pending: PendingTransaction,
) -> anyhow::Result<()> {
    let recipient = recipient()?;
    if let SigningState::PartiallySigned { missing } = pending.sign(&recipient)? {
        bail!("still missing signatures from {:?}", missing);
    }
    let signature = pending.submit(ledger)?;
    println!("{}", explorer::transaction_link(&signature, rpc_url));
    Ok(())
}

fn multisig_mint(ledger: &dyn Ledger, rpc_url: &str, amount: u64) -> anyhow::Result<()> {
    let payer = sender()?;
    let second = recipient()?;
    let third = config::keypair_from_env(config::SECRET_KEY3)?;
    let members = [payer.pubkey(), second.pubkey(), third.pubkey()];

    let multisig = token::create_multisig(ledger, &payer, &Keypair::new(), &members, 2)?;
    let mint = token::create_mint(ledger, &payer, &Keypair::new(), &multisig, 2)?;
    let destination =
        token::get_or_create_associated_token_account(ledger, &payer, &mint, &payer.pubkey())?;
    let signature = token::mint_to(
        ledger,
        &payer,
        &mint,
        &destination,
        &multisig,
        &[&second, &third],
        amount,
    )?;

    println!("Mint {}", explorer::address_link(&mint, rpc_url));
    println!(
        "Minted {} to {}: {}",
        amount,
        destination,
        explorer::transaction_link(&signature, rpc_url)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use cosign::ledger::LocalLedger;
    use solana_sdk::native_token::LAMPORTS_PER_SOL;
    use spl_associated_token_account::get_associated_token_address;

    use super::*;

    #[test]
    fn transfers_to_the_recipient_with_and_without_a_nonce() {
        let ledger = LocalLedger::new();
        let sender = Keypair::new();
        let recipient = Keypair::new();
        let nonce_keypair = Keypair::new();
        for (var, keypair) in [
            (config::SECRET_KEY, &sender),
            (config::SECRET_KEY2, &recipient),
            (config::NONCE_ACCOUNT_KEY, &nonce_keypair),
        ] {
            std::env::set_var(var, wallet::secret_key_json(keypair));
        }
        ledger
            .request_airdrop(&sender.pubkey(), 2 * LAMPORTS_PER_SOL)
            .unwrap();
        ledger
            .request_airdrop(&recipient.pubkey(), LAMPORTS_PER_SOL)
            .unwrap();
        let mint =
            token::create_mint(&ledger, &sender, &Keypair::new(), &sender.pubkey(), 2).unwrap();
        let config = Config {
            handoff_delay: Duration::ZERO,
            ..Config::default()
        };
        let transfer = || TransferArgs {
            mint,
            amount: 2_700,
        };

        run(Command::PayRecipient(transfer()), &ledger, &config).unwrap();
        run(Command::NonceTransfer(transfer()), &ledger, &config).unwrap();

        let sent = get_associated_token_address(&sender.pubkey(), &mint);
        let received = get_associated_token_address(&recipient.pubkey(), &mint);
        assert_eq!(token::token_balance(&ledger, &sent).unwrap(), 0);
        assert_eq!(token::token_balance(&ledger, &received).unwrap(), 5_400);
        assert!(nonce::fetch(&ledger, &nonce_keypair.pubkey())
            .unwrap()
            .is_some());
    }
}
