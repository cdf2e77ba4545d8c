//! Score and economy ledger
//!
//! Derives coins, best scores and play statistics from simulator events.
//! Every update is a read-modify-write against the live store, never a
//! cached copy, so several ledgers over one store converge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::MIN_COUNTED_GAME;
use crate::inventory::DailyBonus;
use crate::modes::{ModeConfig, ModeId};
use crate::persistence::{KeyValueStore, StorageError, load_json, save_json};
use crate::sim::GameEvent;

/// Persisted best score per mode
pub type BestScores = BTreeMap<ModeId, u32>;

/// Persisted play counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayStats {
    /// Rounds that lasted long enough to count
    pub games_played: u64,
    #[serde(default)]
    pub per_mode: BTreeMap<ModeId, u64>,
}

/// What a single event changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub coins: u64,
    /// Set when a game over raised the persisted best
    pub new_best: Option<u32>,
    pub counted: bool,
}

/// Coins for reaching `score` on a hit
pub fn hit_coins(score: u32, multiplier: u32) -> u64 {
    if score % 2 == 0 {
        u64::from(multiplier)
    } else {
        0
    }
}

/// Bonus coins paid at game over
pub fn game_over_coins(mode: ModeId, score: u32, multiplier: u32) -> u64 {
    let divisor = ModeConfig::get(mode).payout_divisor.max(1);
    u64::from(score / divisor) * u64::from(multiplier)
}

/// Best-effort ledger over a key-value store
#[derive(Debug, Clone)]
pub struct Ledger<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Ledger<S> {
    const BEST_KEY: &'static str = "spin_stop_best_scores";
    const COINS_KEY: &'static str = "spin_stop_coins";
    const STATS_KEY: &'static str = "spin_stop_stats";

    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Apply one simulator event. Never fails; storage errors are logged.
    pub fn apply(&self, event: &GameEvent, bonus: &dyn DailyBonus) -> LedgerEntry {
        match *event {
            GameEvent::Hit { mode, score } => {
                let coins = hit_coins(score, bonus.multiplier(mode));
                if coins > 0 {
                    self.add_coins(coins);
                }
                LedgerEntry {
                    coins,
                    ..Default::default()
                }
            }
            GameEvent::GameOver {
                mode,
                score,
                duration,
                ..
            } => {
                let coins = game_over_coins(mode, score, bonus.multiplier(mode));
                if coins > 0 {
                    self.add_coins(coins);
                }
                let new_best = self.record_best(mode, score);
                let counted = duration >= MIN_COUNTED_GAME;
                if counted {
                    self.count_game(mode);
                } else {
                    log::debug!("Round of {:.1}s not counted", duration);
                }
                LedgerEntry {
                    coins,
                    new_best,
                    counted,
                }
            }
            GameEvent::Started { .. }
            | GameEvent::ShieldSaved { .. }
            | GameEvent::Discarded { .. }
            | GameEvent::Revived { .. }
            | GameEvent::Reset { .. } => LedgerEntry::default(),
        }
    }

    /// Apply the game over of a revived run. `settled` is what the run's
    /// earlier game over already paid and counted: only the rest of the
    /// bonus is paid, and the run is counted at most once.
    pub fn apply_revived(
        &self,
        event: &GameEvent,
        bonus: &dyn DailyBonus,
        settled: LedgerEntry,
    ) -> LedgerEntry {
        let GameEvent::GameOver {
            mode,
            score,
            duration,
            ..
        } = *event
        else {
            return self.apply(event, bonus);
        };

        let coins =
            game_over_coins(mode, score, bonus.multiplier(mode)).saturating_sub(settled.coins);
        if coins > 0 {
            self.add_coins(coins);
        }
        let new_best = self.record_best(mode, score);
        let counted = !settled.counted && duration >= MIN_COUNTED_GAME;
        if counted {
            self.count_game(mode);
        }
        LedgerEntry {
            coins,
            new_best,
            counted,
        }
    }

    /// Raise the persisted best for `mode` to at least `score`.
    /// Returns the new best if it changed.
    pub fn record_best(&self, mode: ModeId, score: u32) -> Option<u32> {
        let result = self.update(Self::BEST_KEY, |best: &mut BestScores| {
            let entry = best.entry(mode).or_insert(0);
            if score > *entry {
                *entry = score;
                Some(score)
            } else {
                None
            }
        });
        match result {
            Ok(new_best) => {
                if let Some(best) = new_best {
                    log::info!("New best for {}: {}", mode.as_str(), best);
                }
                new_best
            }
            Err(e) => {
                log::warn!("Failed to record best score: {}", e);
                None
            }
        }
    }

    pub fn best_score(&self, mode: ModeId) -> u32 {
        self.best_scores().get(&mode).copied().unwrap_or(0)
    }

    pub fn best_scores(&self) -> BestScores {
        self.read(Self::BEST_KEY)
    }

    pub fn coins(&self) -> u64 {
        self.read(Self::COINS_KEY)
    }

    pub fn add_coins(&self, amount: u64) {
        if let Err(e) = self.update(Self::COINS_KEY, |coins: &mut u64| {
            *coins = coins.saturating_add(amount);
        }) {
            log::warn!("Failed to add {} coins: {}", amount, e);
        }
    }

    /// Spend coins if the balance allows
    pub fn spend_coins(&self, amount: u64) -> bool {
        let result = self.update(Self::COINS_KEY, |coins: &mut u64| {
            if *coins >= amount {
                *coins -= amount;
                true
            } else {
                false
            }
        });
        result.unwrap_or_else(|e| {
            log::warn!("Failed to spend coins: {}", e);
            false
        })
    }

    pub fn stats(&self) -> PlayStats {
        self.read(Self::STATS_KEY)
    }

    fn count_game(&self, mode: ModeId) {
        if let Err(e) = self.update(Self::STATS_KEY, |stats: &mut PlayStats| {
            stats.games_played += 1;
            *stats.per_mode.entry(mode).or_insert(0) += 1;
        }) {
            log::warn!("Failed to update play stats: {}", e);
        }
    }

    fn read<T: Default + serde::de::DeserializeOwned>(&self, key: &str) -> T {
        match load_json(&self.store, key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read {}: {}", key, e);
                T::default()
            }
        }
    }

    /// Read the live record, change it, write it back
    fn update<T, R>(&self, key: &str, change: impl FnOnce(&mut T) -> R) -> Result<R, StorageError>
    where
        T: Default + Serialize + serde::de::DeserializeOwned,
    {
        let mut value: T = load_json(&self.store, key)?.unwrap_or_default();
        let result = change(&mut value);
        save_json(&self.store, key, &value)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::sim::EndCause;
    use proptest::prelude::*;

    struct Bonus(u32);

    impl DailyBonus for Bonus {
        fn multiplier(&self, _mode: ModeId) -> u32 {
            self.0
        }
    }

    fn game_over(mode: ModeId, score: u32, duration: f32) -> GameEvent {
        GameEvent::GameOver {
            mode,
            score,
            cause: EndCause::Miss,
            duration,
        }
    }

    #[test]
    fn test_hit_coins_every_second_point() {
        let ledger = Ledger::new(MemoryStore::new());
        for score in 1..=6 {
            ledger.apply(&GameEvent::Hit { mode: ModeId::Classic, score }, &Bonus(1));
        }
        assert_eq!(ledger.coins(), 3);

        let entry = ledger.apply(&GameEvent::Hit { mode: ModeId::Classic, score: 8 }, &Bonus(2));
        assert_eq!(entry.coins, 2);
        assert_eq!(ledger.coins(), 5);
    }

    #[test]
    fn test_game_over_payout_uses_mode_divisor() {
        assert_eq!(game_over_coins(ModeId::Classic, 45, 1), 2);
        assert_eq!(game_over_coins(ModeId::Classic, 45, 2), 4);
        assert_eq!(game_over_coins(ModeId::MemoryExpert, 45, 1), 4);
        assert_eq!(game_over_coins(ModeId::Trap, 19, 2), 0);
    }

    #[test]
    fn test_game_over_records_best_and_counts() {
        let ledger = Ledger::new(MemoryStore::new());
        let entry = ledger.apply(&game_over(ModeId::Classic, 40, 12.0), &Bonus(1));
        assert_eq!(entry.new_best, Some(40));
        assert!(entry.counted);
        assert_eq!(entry.coins, 2);
        assert_eq!(ledger.best_score(ModeId::Classic), 40);
        assert_eq!(ledger.stats().games_played, 1);

        let entry = ledger.apply(&game_over(ModeId::Classic, 10, 12.0), &Bonus(1));
        assert_eq!(entry.new_best, None);
        assert_eq!(ledger.best_score(ModeId::Classic), 40);
        assert_eq!(ledger.stats().per_mode.get(&ModeId::Classic), Some(&2));
    }

    #[test]
    fn test_revived_game_over_pays_only_the_difference() {
        let ledger = Ledger::new(MemoryStore::new());
        let first = ledger.apply(&game_over(ModeId::Classic, 40, 10.0), &Bonus(1));
        assert_eq!(first.coins, 2);

        // Same final score after the revive: nothing more to pay
        let again = ledger.apply_revived(&game_over(ModeId::Classic, 40, 20.0), &Bonus(1), first);
        assert_eq!(again.coins, 0);
        assert!(!again.counted);
        assert_eq!(ledger.coins(), 2);

        let higher = ledger.apply_revived(&game_over(ModeId::Classic, 65, 30.0), &Bonus(1), first);
        assert_eq!(higher.coins, 1);
        assert_eq!(higher.new_best, Some(65));
        assert_eq!(ledger.coins(), 3);
        assert_eq!(ledger.stats().games_played, 1);
    }

    #[test]
    fn test_revived_short_game_counts_once_long_enough() {
        let ledger = Ledger::new(MemoryStore::new());
        let first = ledger.apply(&game_over(ModeId::Classic, 2, 3.0), &Bonus(1));
        assert!(!first.counted);

        let after = ledger.apply_revived(&game_over(ModeId::Classic, 9, 8.0), &Bonus(1), first);
        assert!(after.counted);
        assert_eq!(ledger.stats().games_played, 1);
    }

    #[test]
    fn test_short_games_are_not_counted() {
        let ledger = Ledger::new(MemoryStore::new());
        let entry = ledger.apply(&game_over(ModeId::Classic, 3, 4.9), &Bonus(1));
        assert!(!entry.counted);
        assert_eq!(ledger.stats().games_played, 0);
        // Best score still tracks the result
        assert_eq!(ledger.best_score(ModeId::Classic), 3);

        ledger.apply(
            &GameEvent::Discarded {
                mode: ModeId::Survival,
                duration: 2.0,
            },
            &Bonus(1),
        );
        assert_eq!(ledger.stats(), PlayStats::default());
    }

    #[test]
    fn test_two_ledgers_over_one_store_converge() {
        let store = MemoryStore::new();
        let tab_a = Ledger::new(store.clone());
        let tab_b = Ledger::new(store);

        tab_a.record_best(ModeId::Trap, 30);
        tab_b.record_best(ModeId::Trap, 25);
        tab_b.record_best(ModeId::Chaos, 7);
        assert_eq!(tab_a.best_score(ModeId::Trap), 30);
        assert_eq!(tab_a.best_score(ModeId::Chaos), 7);

        tab_a.add_coins(5);
        tab_b.add_coins(4);
        assert_eq!(tab_a.coins(), 9);
    }

    #[test]
    fn test_storage_failure_is_best_effort() {
        let store = MemoryStore::new();
        let ledger = Ledger::new(store.clone());
        ledger.record_best(ModeId::Classic, 10);

        store.set_unavailable(true);
        let entry = ledger.apply(&game_over(ModeId::Classic, 50, 30.0), &Bonus(1));
        assert_eq!(entry.new_best, None);
        assert_eq!(ledger.coins(), 0);

        store.set_unavailable(false);
        assert_eq!(ledger.best_score(ModeId::Classic), 10);
    }

    #[test]
    fn test_spend_coins() {
        let ledger = Ledger::new(MemoryStore::new());
        ledger.add_coins(10);
        assert!(ledger.spend_coins(7));
        assert!(!ledger.spend_coins(7));
        assert_eq!(ledger.coins(), 3);
    }

    proptest! {
        #[test]
        fn best_score_is_max_of_history(
            initial in 0u32..1000,
            scores in proptest::collection::vec(0u32..1000, 0..20),
        ) {
            let ledger = Ledger::new(MemoryStore::new());
            ledger.record_best(ModeId::Classic, initial);
            for &score in &scores {
                ledger.apply(&game_over(ModeId::Classic, score, 10.0), &Bonus(1));
            }
            let expected = scores.iter().copied().fold(initial, u32::max);
            prop_assert_eq!(ledger.best_score(ModeId::Classic), expected);
        }
    }
}
