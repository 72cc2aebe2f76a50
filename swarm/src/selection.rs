//! Account selection per round

use crate::SwarmError;
use gauntlet_types::Account;
use rand::seq::SliceRandom;
use rand::Rng;
use std::str::FromStr;

/// How a round's accounts are drawn from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Random accounts from anywhere in the pool
    #[default]
    Sampled,
    /// A run of neighbouring accounts at a random offset
    Contiguous,
}

impl FromStr for SelectionMode {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sampled" | "random" => Ok(SelectionMode::Sampled),
            "contiguous" => Ok(SelectionMode::Contiguous),
            other => Err(SwarmError::InvalidSetting(format!("selection mode: {}", other))),
        }
    }
}

/// Draws a fixed-size window of accounts for each catalog entry
#[derive(Debug, Clone)]
pub struct AccountSelector {
    accounts: Vec<Account>,
    mode: SelectionMode,
    window: usize,
}

impl AccountSelector {
    /// The round budget is split evenly across catalog entries, one account
    /// at least, never more than the pool holds
    pub fn new(accounts: Vec<Account>, mode: SelectionMode, budget: usize, catalog_len: usize) -> Self {
        let window = (budget / catalog_len.max(1)).max(1).min(accounts.len());
        Self {
            accounts,
            mode,
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn pool_size(&self) -> usize {
        self.accounts.len()
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Account> {
        if self.window == 0 {
            return Vec::new();
        }

        match self.mode {
            SelectionMode::Sampled => self
                .accounts
                .choose_multiple(rng, self.window)
                .copied()
                .collect(),
            SelectionMode::Contiguous => {
                let start = rng.gen_range(0..=self.accounts.len() - self.window);
                self.accounts[start..start + self.window].to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn pool(n: u32) -> Vec<Account> {
        (0..n)
            .map(|i| Account::new(Address::from_low_u64_be(0xA000 + i as u64), i))
            .collect()
    }

    #[test]
    fn test_window_splits_budget() {
        assert_eq!(AccountSelector::new(pool(100), SelectionMode::Sampled, 60, 4).window(), 15);
        assert_eq!(AccountSelector::new(pool(100), SelectionMode::Sampled, 60, 100).window(), 1);
        assert_eq!(AccountSelector::new(pool(5), SelectionMode::Sampled, 60, 1).window(), 5);
        assert_eq!(AccountSelector::new(Vec::new(), SelectionMode::Sampled, 60, 1).window(), 0);
    }

    #[test]
    fn test_sampled_accounts_are_distinct() {
        let selector = AccountSelector::new(pool(27), SelectionMode::Sampled, 60, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..20 {
            let picked = selector.select(&mut rng);
            let unique: HashSet<_> = picked.iter().map(|a| a.address).collect();
            assert_eq!(picked.len(), 15);
            assert_eq!(unique.len(), 15);
        }
    }

    #[test]
    fn test_contiguous_accounts_are_neighbours() {
        let selector = AccountSelector::new(pool(27), SelectionMode::Contiguous, 20, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        for _ in 0..20 {
            let picked = selector.select(&mut rng);
            assert_eq!(picked.len(), 10);
            for pair in picked.windows(2) {
                assert_eq!(pair[1].index, pair[0].index + 1);
            }
        }
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        let selector = AccountSelector::new(Vec::new(), SelectionMode::Contiguous, 10, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(selector.select(&mut rng).is_empty());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("contiguous".parse::<SelectionMode>().unwrap(), SelectionMode::Contiguous);
        assert_eq!("Sampled".parse::<SelectionMode>().unwrap(), SelectionMode::Sampled);
        assert!("zipf".parse::<SelectionMode>().is_err());
    }
}
