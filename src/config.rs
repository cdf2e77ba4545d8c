//! Ad timing configuration
//!
//! Persisted separately from game records so timings can be tuned remotely.
//! Unknown or missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::persistence::{KeyValueStore, load_json, save_json};

/// Rewarded unit timings (milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardedConfig {
    /// Minimum time between two shows
    pub cooldown_ms: Millis,
    /// First preload retry delay, doubled per failure
    pub backoff_base_ms: Millis,
    /// Ceiling of the preload retry delay
    pub backoff_cap_ms: Millis,
    /// Preload retry delay after a failed show
    pub failed_show_retry_ms: Millis,
    /// How long to wait for a dismiss after the reward callback
    pub reward_dismiss_wait_ms: Millis,
    /// Dismisses this soon after `Showed` count as failures
    pub fast_dismiss_ms: Millis,
    /// Window for a late reward after a dismiss
    pub grace_ms: Millis,
    /// Absolute backstop for one show
    pub safety_timeout_ms: Millis,
}

impl Default for RewardedConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 60_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            failed_show_retry_ms: 1_000,
            reward_dismiss_wait_ms: 12_000,
            fast_dismiss_ms: 800,
            grace_ms: 5_000,
            safety_timeout_ms: 60_000,
        }
    }
}

/// Interstitial unit timings (milliseconds) and caps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterstitialConfig {
    /// No interstitial until the app has been open this long
    pub min_session_age_ms: Millis,
    /// Minimum time between two interstitials
    pub cooldown_ms: Millis,
    /// Minimum time since the last rewarded ad began
    pub rewarded_gap_ms: Millis,
    /// Interstitials per app session
    pub session_cap: u32,
    /// UI settling delay before the show call
    pub settle_delay_ms: Millis,
    /// Delay before preloading the next unit
    pub preload_delay_ms: Millis,
    /// Absolute backstop for one show
    pub safety_timeout_ms: Millis,
    /// Status-bar restore passes after a show (native only)
    pub restore_offsets_ms: Vec<Millis>,
    pub backoff_base_ms: Millis,
    pub backoff_cap_ms: Millis,
}

impl Default for InterstitialConfig {
    fn default() -> Self {
        Self {
            min_session_age_ms: 360_000,
            cooldown_ms: 420_000,
            rewarded_gap_ms: 90_000,
            session_cap: 3,
            settle_delay_ms: 1_000,
            preload_delay_ms: 2_000,
            safety_timeout_ms: 60_000,
            restore_offsets_ms: vec![0, 200, 700, 1_500],
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
        }
    }
}

/// All ad timings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdConfig {
    pub rewarded: RewardedConfig,
    pub interstitial: InterstitialConfig,
}

impl AdConfig {
    const STORAGE_KEY: &'static str = "spin_stop_ad_config";

    /// Load from storage, falling back to defaults
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        match load_json(store, Self::STORAGE_KEY) {
            Ok(Some(config)) => {
                log::info!("Loaded ad config from storage");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("Using default ad config: {}", e);
                Self::default()
            }
        }
    }

    /// Save to storage (best effort)
    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) {
        match save_json(store, Self::STORAGE_KEY, self) {
            Ok(()) => log::info!("Ad config saved"),
            Err(e) => log::warn!("Failed to save ad config: {}", e),
        }
    }
}
