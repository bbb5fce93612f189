//! Nullable bank: in-memory balances with atomic transfers.

use farm_store::{Bank, BankError};
use farm_types::{Address, Amount, Coins, Denom};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// An in-memory bank for testing.
///
/// Balances start at zero; fund accounts with [`NullBank::mint`].
pub struct NullBank {
    balances: Mutex<BTreeMap<(Address, Denom), Amount>>,
}

impl NullBank {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(BTreeMap::new()),
        }
    }

    /// Credit `coins` to `address` out of thin air.
    pub fn mint(&self, address: &Address, coins: &Coins) {
        let mut balances = self.balances.lock().unwrap();
        for (denom, amount) in coins.iter() {
            *balances.entry((address.clone(), denom.clone())).or_insert(0) += amount;
        }
    }

    /// Balance of `denom` held by `address` (zero when never funded).
    pub fn balance_of(&self, address: &Address, denom: &Denom) -> Amount {
        self.balances
            .lock()
            .unwrap()
            .get(&(address.clone(), denom.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of `denom` across every account.
    pub fn supply_of(&self, denom: &Denom) -> Amount {
        self.balances
            .lock()
            .unwrap()
            .iter()
            .filter(|((_, d), _)| d == denom)
            .map(|(_, a)| *a)
            .sum()
    }
}

impl Default for NullBank {
    fn default() -> Self {
        Self::new()
    }
}

impl Bank for NullBank {
    fn transfer(&self, from: &Address, to: &Address, coins: &Coins) -> Result<(), BankError> {
        let mut balances = self.balances.lock().unwrap();

        // Check every denom before moving anything.
        for (denom, amount) in coins.iter() {
            let available = balances
                .get(&(from.clone(), denom.clone()))
                .copied()
                .unwrap_or(0);
            if available < *amount {
                return Err(BankError::InsufficientFunds {
                    address: from.clone(),
                    denom: denom.clone(),
                    needed: *amount,
                    available,
                });
            }
        }

        for (denom, amount) in coins.iter() {
            *balances.entry((from.clone(), denom.clone())).or_insert(0) -= amount;
            *balances.entry((to.clone(), denom.clone())).or_insert(0) += amount;
        }
        Ok(())
    }

    fn balance(&self, address: &Address, denom: &Denom) -> Result<Amount, BankError> {
        Ok(self.balance_of(address, denom))
    }
}
