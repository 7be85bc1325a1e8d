use solana_sdk::{pubkey::Pubkey, signature::Signature};

/// Cluster query parameter for the explorer, derived from the RPC URL.
/// `None` for mainnet.
pub fn cluster_of(rpc_url: &str) -> Option<&'static str> {
    if rpc_url.contains("devnet") {
        Some("devnet")
    } else if rpc_url.contains("testnet") {
        Some("testnet")
    } else if rpc_url.contains("localhost") || rpc_url.contains("127.0.0.1") {
        Some("custom")
    } else {
        None
    }
}

fn link(kind: &str, value: &str, rpc_url: &str) -> String {
    match cluster_of(rpc_url) {
        Some(cluster) => format!("https://explorer.solana.com/{kind}/{value}?cluster={cluster}"),
        None => format!("https://explorer.solana.com/{kind}/{value}"),
    }
}

pub fn transaction_link(signature: &Signature, rpc_url: &str) -> String {
    link("tx", &signature.to_string(), rpc_url)
}

pub fn address_link(address: &Pubkey, rpc_url: &str) -> String {
    link("address", &address.to_string(), rpc_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devnet_links_carry_cluster() {
        let address = Pubkey::new_unique();
        assert_eq!(
            address_link(&address, "https://api.devnet.solana.com"),
            format!("https://explorer.solana.com/address/{address}?cluster=devnet")
        );
        assert_eq!(cluster_of("https://api.mainnet-beta.solana.com"), None);
    }
}
