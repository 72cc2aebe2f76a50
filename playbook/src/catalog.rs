//! Weighted action list

use crate::actions::by_name;
use crate::{Action, PlaybookError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Actions a worker draws from. Duplicates weight an action.
#[derive(Clone)]
pub struct Catalog {
    actions: Vec<Arc<dyn Action>>,
}

impl Catalog {
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Result<Self, PlaybookError> {
        if actions.is_empty() {
            return Err(PlaybookError::EmptyCatalog);
        }
        Ok(Self { actions })
    }

    /// One entry per unit of weight; zero weights drop the action
    pub fn from_weights(weights: &BTreeMap<String, u32>) -> Result<Self, PlaybookError> {
        let mut actions = Vec::new();
        for (name, weight) in weights {
            let action = by_name(name).ok_or_else(|| PlaybookError::UnknownAction(name.clone()))?;
            for _ in 0..*weight {
                actions.push(action.clone());
            }
        }

        let catalog = Self::new(actions)?;
        tracing::info!("PLAYBOOK: Catalog of {} entries: {:?}", catalog.len(), weights);
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// The catalog in a fresh random order
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Arc<dyn Action>> {
        let mut actions = self.actions.clone();
        actions.shuffle(rng);
        actions
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("actions", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weights(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    #[test]
    fn test_weights_become_duplicates() {
        let catalog = Catalog::from_weights(&weights(&[("stake", 1), ("swap", 3), ("vote", 0)])).unwrap();

        assert_eq!(catalog.len(), 4);
        let names = catalog.names();
        assert_eq!(names.iter().filter(|n| **n == "swap").count(), 3);
        assert!(!names.contains(&"vote"));
    }

    #[test]
    fn test_unknown_and_empty_catalogs_are_rejected() {
        assert!(matches!(
            Catalog::from_weights(&weights(&[("mint", 1)])),
            Err(PlaybookError::UnknownAction(name)) if name == "mint"
        ));
        assert!(matches!(
            Catalog::from_weights(&weights(&[("swap", 0)])),
            Err(PlaybookError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_shuffle_keeps_entries() {
        let catalog = Catalog::from_weights(&weights(&[("stake", 1), ("swap", 3)])).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let mut shuffled: Vec<_> = catalog.shuffled(&mut rng).iter().map(|a| a.name()).collect();
        let mut original = catalog.names();
        shuffled.sort();
        original.sort();
        assert_eq!(shuffled, original);
    }
}
