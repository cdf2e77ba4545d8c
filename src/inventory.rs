//! Boost inventory, expert tickets and daily bonus multipliers
//!
//! The simulator and ledger only see the traits; `StoredWallet` is the
//! default implementation over a `KeyValueStore`.

use std::collections::BTreeMap;

use crate::modes::ModeId;
use crate::persistence::{KeyValueStore, StorageError, load_json, save_json};
use crate::sim::Boost;

/// Owned boosts, consumed by value before a round starts
pub trait BoostInventory {
    /// Remove one boost; false if none are owned
    fn consume(&mut self, boost: Boost) -> bool;
    /// Number of boosts of this kind owned
    fn get(&self, boost: Boost) -> u32;
}

/// Gate for ticket-only modes
pub trait TicketStore {
    /// Remove one ticket; false if none are owned
    fn consume(&mut self) -> bool;
}

/// Per-mode coin multiplier of the day
pub trait DailyBonus {
    /// 1 normally, 2 when the mode is today's bonus mode
    fn multiplier(&self, mode: ModeId) -> u32;
}

const TICKETS_KEY: &str = "spin_stop_tickets";
const BONUS_KEY: &str = "spin_stop_daily_bonus";

fn boost_key(boost: Boost) -> String {
    format!("spin_stop_boost_{}", boost.as_str())
}

/// Boosts, tickets and bonus modes persisted in a key-value store.
///
/// Counts are read from and written to the store on every call so several
/// wallets over one store stay consistent. Storage failures are logged and
/// read as "nothing owned".
#[derive(Debug, Clone)]
pub struct StoredWallet<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> StoredWallet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read_count(&self, key: &str) -> u32 {
        match load_json::<u32, _>(&self.store, key) {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                log::warn!("Failed to read {}: {}", key, e);
                0
            }
        }
    }

    fn write_count(&self, key: &str, count: u32) -> bool {
        match save_json(&self.store, key, &count) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to write {}: {}", key, e);
                false
            }
        }
    }

    fn take_one(&self, key: &str) -> bool {
        let count = self.read_count(key);
        count > 0 && self.write_count(key, count - 1)
    }

    /// Add boosts (shop purchase, ad reward)
    pub fn grant_boost(&self, boost: Boost, amount: u32) {
        let key = boost_key(boost);
        let count = self.read_count(&key).saturating_add(amount);
        self.write_count(&key, count);
    }

    /// Add expert tickets
    pub fn grant_tickets(&self, amount: u32) {
        let count = self.read_count(TICKETS_KEY).saturating_add(amount);
        self.write_count(TICKETS_KEY, count);
    }

    pub fn tickets(&self) -> u32 {
        self.read_count(TICKETS_KEY)
    }

    /// Mark a mode as today's double-coin mode (or clear it)
    pub fn set_bonus_mode(&self, mode: ModeId, active: bool) -> Result<(), StorageError> {
        let mut bonus: BTreeMap<ModeId, bool> =
            load_json(&self.store, BONUS_KEY)?.unwrap_or_default();
        bonus.insert(mode, active);
        save_json(&self.store, BONUS_KEY, &bonus)
    }
}

impl<S: KeyValueStore> BoostInventory for StoredWallet<S> {
    fn consume(&mut self, boost: Boost) -> bool {
        self.take_one(&boost_key(boost))
    }

    fn get(&self, boost: Boost) -> u32 {
        self.read_count(&boost_key(boost))
    }
}

impl<S: KeyValueStore> TicketStore for StoredWallet<S> {
    fn consume(&mut self) -> bool {
        self.take_one(TICKETS_KEY)
    }
}

impl<S: KeyValueStore> DailyBonus for StoredWallet<S> {
    fn multiplier(&self, mode: ModeId) -> u32 {
        match load_json::<BTreeMap<ModeId, bool>, _>(&self.store, BONUS_KEY) {
            Ok(Some(bonus)) if bonus.get(&mode).copied().unwrap_or(false) => 2,
            Ok(_) => 1,
            Err(e) => {
                log::warn!("Failed to read daily bonus: {}", e);
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_boosts_are_consumed_by_value() {
        let mut wallet = StoredWallet::new(MemoryStore::new());
        assert!(!BoostInventory::consume(&mut wallet, Boost::Shield));

        wallet.grant_boost(Boost::Shield, 2);
        assert_eq!(wallet.get(Boost::Shield), 2);
        assert!(BoostInventory::consume(&mut wallet, Boost::Shield));
        assert!(BoostInventory::consume(&mut wallet, Boost::Shield));
        assert!(!BoostInventory::consume(&mut wallet, Boost::Shield));
        assert_eq!(wallet.get(Boost::BiggerZone), 0);
    }

    #[test]
    fn test_tickets() {
        let store = MemoryStore::new();
        let mut wallet = StoredWallet::new(store.clone());
        wallet.grant_tickets(1);
        assert_eq!(StoredWallet::new(store).tickets(), 1);
        assert!(TicketStore::consume(&mut wallet));
        assert!(!TicketStore::consume(&mut wallet));
    }

    #[test]
    fn test_daily_bonus_multiplier() {
        let wallet = StoredWallet::new(MemoryStore::new());
        assert_eq!(wallet.multiplier(ModeId::Classic), 1);
        wallet.set_bonus_mode(ModeId::Classic, true).unwrap();
        assert_eq!(wallet.multiplier(ModeId::Classic), 2);
        assert_eq!(wallet.multiplier(ModeId::Trap), 1);
    }

    #[test]
    fn test_unavailable_storage_owns_nothing() {
        let store = MemoryStore::new();
        let mut wallet = StoredWallet::new(store.clone());
        wallet.grant_tickets(3);
        store.set_unavailable(true);
        assert!(!TicketStore::consume(&mut wallet));
        assert_eq!(wallet.multiplier(ModeId::Classic), 1);
        store.set_unavailable(false);
        assert_eq!(wallet.tickets(), 3);
    }
}
