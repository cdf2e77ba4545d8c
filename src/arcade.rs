//! Session wiring for the host layer
//!
//! `Arcade` owns the simulator and its frame clock, pays out through the
//! ledger and spends boosts and tickets from the wallet. Hosts feed it frame
//! timestamps, taps and resolved rewarded-ad results.

use crate::ads::{RewardKind, ShowResult};
use crate::consts::{INPUT_DEBOUNCE, SIM_DT};
use crate::inventory::{BoostInventory, StoredWallet};
use crate::ledger::{Ledger, LedgerEntry};
use crate::modes::ModeId;
use crate::persistence::KeyValueStore;
use crate::sim::{Boost, EndCause, FrameClock, GameEvent, GameStatus, Judgment, Simulator, Snapshot};

/// Boost granted by a `FreeBoost` reward
pub const FREE_BOOST: Boost = Boost::Shield;

/// One player's game session
pub struct Arcade<S: KeyValueStore> {
    sim: Simulator,
    clock: FrameClock,
    ledger: Ledger<S>,
    wallet: StoredWallet<S>,
    /// Processed events not yet taken by the host
    events: Vec<GameEvent>,
    /// What the current run has paid and counted at game over, summed over
    /// a revive
    last_result: Option<LedgerEntry>,
    /// Coins earned in the current run
    run_coins: u64,
    /// Host timestamp (ms) of the last accepted tap
    last_tap_ms: Option<f64>,
    revive_used: bool,
    coins_doubled: bool,
}

impl<S: KeyValueStore + Clone> Arcade<S> {
    /// Ledger and wallet share `store`
    pub fn new(store: S, seed: u64) -> Self {
        Self {
            sim: Simulator::new(seed),
            clock: FrameClock::new(),
            ledger: Ledger::new(store.clone()),
            wallet: StoredWallet::new(store),
            events: Vec::new(),
            last_result: None,
            run_coins: 0,
            last_tap_ms: None,
            revive_used: false,
            coins_doubled: false,
        }
    }
}

impl<S: KeyValueStore> Arcade<S> {
    pub fn snapshot(&self) -> Snapshot {
        self.sim.snapshot()
    }

    pub fn status(&self) -> GameStatus {
        self.sim.status()
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn wallet(&self) -> &StoredWallet<S> {
        &self.wallet
    }

    pub fn last_result(&self) -> Option<LedgerEntry> {
        self.last_result
    }

    pub fn run_coins(&self) -> u64 {
        self.run_coins
    }

    /// Take the events processed since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn select_mode(&mut self, mode: ModeId) -> bool {
        let changed = self.sim.select_mode(mode);
        if changed {
            self.clock.stop();
        }
        changed
    }

    /// Start a round with the selected boosts. Boosts the player does not own
    /// are skipped; the rest are consumed only once the round has started.
    pub fn start_game(&mut self, mode: ModeId, boosts: &[Boost]) -> bool {
        let mut owned: Vec<Boost> = Vec::with_capacity(boosts.len());
        for &boost in boosts {
            if owned.contains(&boost) {
                continue;
            }
            if self.wallet.get(boost) > 0 {
                owned.push(boost);
            } else {
                log::info!("Boost {} not owned, skipping", boost.as_str());
            }
        }

        if !self.sim.start(mode, &owned, &mut self.wallet) {
            return false;
        }
        for &boost in &owned {
            if !BoostInventory::consume(&mut self.wallet, boost) {
                log::warn!("Boost {} vanished before it could be consumed", boost.as_str());
            }
        }

        self.clock.stop();
        self.run_coins = 0;
        self.last_tap_ms = None;
        self.revive_used = false;
        self.coins_doubled = false;
        self.last_result = None;
        self.pump();
        true
    }

    /// Advance the simulation to an animation-frame timestamp (ms)
    pub fn on_frame(&mut self, timestamp_ms: f64) {
        if !self.sim.state().is_running() {
            self.clock.stop();
            return;
        }

        let steps = self.clock.advance(timestamp_ms);
        for _ in 0..steps {
            self.sim.tick(SIM_DT);
            if !self.sim.state().is_running() {
                break;
            }
        }
        self.after_step();
    }

    /// Judge a tap at a host timestamp (ms). Taps closer together than the
    /// debounce window are dropped, even when no frame ran between them.
    pub fn on_input(&mut self, timestamp_ms: f64) -> Judgment {
        if !self.sim.state().is_running() {
            return Judgment::Ignored;
        }
        let window = f64::from(INPUT_DEBOUNCE) * 1000.0;
        if self
            .last_tap_ms
            .is_some_and(|last| timestamp_ms - last < window)
        {
            return Judgment::Ignored;
        }
        self.last_tap_ms = Some(timestamp_ms);

        let judgment = self.sim.judge();
        self.after_step();
        judgment
    }

    pub fn reset(&mut self) {
        self.sim.reset();
        self.clock.stop();
        self.pump();
    }

    /// Revive is offered once per run, and never after time ran out
    pub fn can_revive(&self) -> bool {
        let state = self.sim.state();
        state.status == GameStatus::GameOver
            && !self.revive_used
            && state.end_cause != Some(EndCause::TimeUp)
    }

    /// Revive the finished round if `result` is an earned revive reward
    pub fn revive_with(&mut self, result: &ShowResult) -> bool {
        if result.kind != RewardKind::Revive || !result.is_rewarded() {
            log::info!("Revive refused: ad result {:?}", result.status);
            return false;
        }
        if !self.can_revive() || !self.sim.revive() {
            log::info!("Revive refused: not available");
            return false;
        }

        self.revive_used = true;
        self.last_tap_ms = None;
        self.clock.stop();
        self.pump();
        true
    }

    /// Grant what a resolved rewarded ad earned. Returns false when nothing
    /// was granted.
    pub fn apply_reward(&mut self, result: &ShowResult) -> bool {
        if !result.is_rewarded() {
            log::debug!("No reward for {:?}: {:?}", result.kind, result.status);
            return false;
        }

        match result.kind {
            RewardKind::Revive => self.revive_with(result),
            RewardKind::DoubleCoins => {
                if self.coins_doubled || self.run_coins == 0 {
                    return false;
                }
                self.ledger.add_coins(self.run_coins);
                self.coins_doubled = true;
                log::info!("Doubled run coins: +{}", self.run_coins);
                true
            }
            RewardKind::FreeBoost => {
                self.wallet.grant_boost(FREE_BOOST, 1);
                true
            }
            RewardKind::Ticket => {
                self.wallet.grant_tickets(1);
                true
            }
        }
    }

    fn after_step(&mut self) {
        if !self.sim.state().is_running() {
            self.clock.stop();
        }
        self.pump();
    }

    /// Pay out simulator events through the ledger
    fn pump(&mut self) {
        for event in self.sim.drain_events() {
            let settled = self.last_result.filter(|_| self.revive_used);
            let entry = match (event, settled) {
                // A revived run ends again: settle only what is still owed
                (GameEvent::GameOver { .. }, Some(settled)) => {
                    let entry = self.ledger.apply_revived(&event, &self.wallet, settled);
                    self.last_result = Some(LedgerEntry {
                        coins: settled.coins + entry.coins,
                        new_best: entry.new_best.or(settled.new_best),
                        counted: settled.counted || entry.counted,
                    });
                    entry
                }
                (GameEvent::GameOver { .. }, None) => {
                    let entry = self.ledger.apply(&event, &self.wallet);
                    self.last_result = Some(entry);
                    entry
                }
                _ => self.ledger.apply(&event, &self.wallet),
            };
            self.run_coins += entry.coins;
            self.events.push(event);
        }
    }
}
