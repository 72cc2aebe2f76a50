//! Signing keys for the simulated accounts and the funding source

use crate::GatewayError;
use ethers::signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer};
use ethers::types::Address;
use gauntlet_config::NetworkConfig;
use gauntlet_types::Account;
use std::collections::HashMap;

/// Wallet at `m/44'/60'/0'/0/{index}` of `phrase`
pub fn derive(phrase: &str, index: u32, chain_id: u64) -> Result<LocalWallet, GatewayError> {
    let wallet = MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(index)?
        .build()?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Every key the gateway can sign with
#[derive(Debug, Clone)]
pub struct WalletSet {
    accounts: Vec<Account>,
    funding_source: Account,
    wallets: HashMap<Address, LocalWallet>,
}

impl WalletSet {
    /// Derive the account pool and resolve the funding source. An explicit
    /// funding key wins over the mnemonic index.
    pub fn from_config(network: &NetworkConfig, chain_id: u64) -> Result<Self, GatewayError> {
        let phrase = network.mnemonic().ok_or(GatewayError::MissingMnemonic)?;
        let (first, last) = network.account_range();

        let mut wallets = HashMap::new();
        let mut accounts = Vec::new();
        for index in first..=last {
            let wallet = derive(phrase, index, chain_id)?;
            accounts.push(Account::new(wallet.address(), index));
            wallets.insert(wallet.address(), wallet);
        }

        let source = match &network.funding_source_key {
            Some(key) => key.parse::<LocalWallet>()?.with_chain_id(chain_id),
            None => derive(phrase, network.funding_source_index, chain_id)?,
        };
        let funding_source = Account::new(source.address(), network.funding_source_index);
        wallets.insert(source.address(), source);

        tracing::info!(
            "GATEWAY: Derived {} accounts (indices {}..={}), funding source {:?}",
            accounts.len(),
            first,
            last,
            funding_source.address
        );

        Ok(Self {
            accounts,
            funding_source,
            wallets,
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn funding_source(&self) -> Account {
        self.funding_source
    }

    pub fn wallets(&self) -> impl Iterator<Item = &LocalWallet> {
        self.wallets.values()
    }

    pub fn get(&self, address: &Address) -> Option<&LocalWallet> {
        self.wallets.get(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_config::DEV_MNEMONIC;
    use gauntlet_types::NetworkMode;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_derives_development_accounts() {
        let first = derive(DEV_MNEMONIC, 0, 31337).unwrap();
        assert_eq!(first.address(), addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert_eq!(first.chain_id(), 31337);

        let third = derive(DEV_MNEMONIC, 2, 31337).unwrap();
        assert_eq!(third.address(), addr("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"));
    }

    #[test]
    fn test_local_pool_and_funding_source() {
        let network = NetworkConfig::default();
        let set = WalletSet::from_config(&network, 31337).unwrap();

        assert_eq!(set.accounts().len(), 27);
        assert_eq!(set.accounts()[0].index, 4);
        assert_eq!(set.accounts()[0].address, addr("0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65"));
        assert_eq!(
            set.funding_source().address,
            addr("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC")
        );
        assert!(set.get(&set.funding_source().address).is_some());
        assert_eq!(set.wallets().count(), 28);
    }

    #[test]
    fn test_explicit_funding_key_wins() {
        let network = NetworkConfig {
            first_account: Some(5),
            last_account: Some(6),
            // Development account #0
            funding_source_key: Some(
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            ..NetworkConfig::default()
        };
        let set = WalletSet::from_config(&network, 31337).unwrap();

        assert_eq!(set.accounts().len(), 2);
        assert_eq!(
            set.funding_source().address,
            addr("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_live_mode_requires_mnemonic() {
        let network = NetworkConfig {
            mode: NetworkMode::Live,
            ..NetworkConfig::default()
        };
        assert!(matches!(
            WalletSet::from_config(&network, 1),
            Err(GatewayError::MissingMnemonic)
        ));
    }
}
