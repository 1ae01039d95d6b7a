//! Economy backend the pickup path credits

use crate::PlayerId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Host economy
pub trait Economy: Send + Sync {
    /// Credit `amount` to `player`; `false` when the backend refused
    fn deposit(&self, player: PlayerId, amount: u32) -> bool;
}

/// Balances kept in process memory
#[derive(Debug, Default)]
pub struct MemoryEconomy {
    balances: Mutex<HashMap<PlayerId, u64>>,
    refuse: Mutex<bool>,
}

impl MemoryEconomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, player: PlayerId) -> u64 {
        self.balances.lock().get(&player).copied().unwrap_or(0)
    }

    /// Make subsequent deposits fail
    pub fn refuse_deposits(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }
}

impl Economy for MemoryEconomy {
    fn deposit(&self, player: PlayerId, amount: u32) -> bool {
        if *self.refuse.lock() {
            return false;
        }
        *self.balances.lock().entry(player).or_insert(0) += amount as u64;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit() {
        let economy = MemoryEconomy::new();
        let bob = PlayerId::new(2);

        assert!(economy.deposit(bob, 3));
        assert!(economy.deposit(bob, 4));
        assert_eq!(economy.balance(bob), 7);

        economy.refuse_deposits(true);
        assert!(!economy.deposit(bob, 10));
        assert_eq!(economy.balance(bob), 7);
    }
}
