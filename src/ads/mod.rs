//! Rewarded and interstitial ad lifecycle
//!
//! Two independent state machines driven by explicit timestamps:
//! - `RewardedController`: preload, cooldown, single-flight show and
//!   reconciliation of provider events into one `ShowStatus`
//! - `InterstitialScheduler`: eligibility gate and show flow, told about
//!   rewarded shows through a one-way `RewardedSignal`
//!
//! Nothing happens in the background: hosts call `advance(now)` from their
//! frame loop (or a timer) and report preload results as they arrive.

pub mod events;
pub mod interstitial;
pub mod provider;
pub mod rewarded;
pub mod timer;

#[cfg(test)]
pub(crate) mod fake;

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::Millis;

pub use events::{AdEvents, ProviderEvent, Subscription};
pub use interstitial::InterstitialScheduler;
pub use provider::{AdProvider, NoAds, ProviderError};
pub use rewarded::{RewardedController, RewardedPhase};
pub use timer::TimerRegistry;

/// Ad unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdKind {
    Rewarded,
    Interstitial,
}

impl AdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdKind::Rewarded => "rewarded",
            AdKind::Interstitial => "interstitial",
        }
    }

    /// Storage key of the unit's last-shown timestamp
    pub fn last_shown_key(&self) -> String {
        format!("spin_stop_ad_last_shown_{}", self.as_str())
    }
}

/// Identifies one preload request. The host passes it back with the load
/// outcome so results of superseded loads can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadTicket(pub u64);

/// What the player is watching a rewarded ad for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Revive,
    DoubleCoins,
    FreeBoost,
    Ticket,
}

/// Final status of one rewarded show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    /// Reward earned
    Rewarded,
    /// Watched and closed without earning
    Closed,
    /// Not shown, or broken; a normal, frequent outcome
    Failed,
}

/// Resolution of a rewarded show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowResult {
    pub status: ShowStatus,
    pub kind: RewardKind,
    pub resolved_at: Millis,
}

impl ShowResult {
    pub fn is_rewarded(&self) -> bool {
        self.status == ShowStatus::Rewarded
    }
}

/// A value that is filled in exactly once by its state machine
#[derive(Debug)]
pub struct AdHandle<T> {
    slot: Rc<OnceCell<T>>,
}

impl<T> Clone for AdHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Copy> AdHandle<T> {
    pub(crate) fn pending() -> Self {
        Self {
            slot: Rc::new(OnceCell::new()),
        }
    }

    pub(crate) fn ready(value: T) -> Self {
        let handle = Self::pending();
        let _ = handle.slot.set(value);
        handle
    }

    /// Fill the slot; false if it was already resolved
    pub(crate) fn resolve(&self, value: T) -> bool {
        self.slot.set(value).is_ok()
    }

    /// The resolved value, or `None` while still pending
    pub fn result(&self) -> Option<T> {
        self.slot.get().copied()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.get().is_none()
    }
}

/// Handle returned by `RewardedController::show`
pub type ShowHandle = AdHandle<ShowResult>;

/// Handle returned by `InterstitialScheduler::show_if_eligible`; `true` if an
/// ad was actually presented
pub type InterstitialHandle = AdHandle<bool>;

/// One-way "a rewarded ad began at t" signal from the rewarded controller to
/// the interstitial gate
#[derive(Debug, Clone, Default)]
pub struct RewardedSignal {
    last: Rc<Cell<Option<Millis>>>,
}

impl RewardedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, at: Millis) {
        self.last.set(Some(at));
    }

    pub fn last(&self) -> Option<Millis> {
        self.last.get()
    }
}

/// `min(base × 2^retry, cap)` without overflow
pub fn backoff_delay(base: Millis, cap: Millis, retry: u32) -> Millis {
    let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(cap)
}
