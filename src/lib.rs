//! Spin Stop - A rotating-pointer "stop in the zone" arcade game core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (pointer, zones, judging)
//! - `modes`: Static game-mode table
//! - `ledger`: Coins, best scores and play statistics
//! - `inventory`: Boosts, tickets and daily bonus seams
//! - `ads`: Rewarded and interstitial ad lifecycle state machines
//! - `config`: Ad timings
//! - `arcade`: Session wiring for the host layer
//! - `persistence`: Key-value storage abstraction
//! - `platform`: Browser/native platform abstraction

pub mod ads;
pub mod arcade;
pub mod config;
pub mod inventory;
pub mod ledger;
pub mod modes;
pub mod persistence;
pub mod platform;
pub mod sim;

pub use arcade::Arcade;
pub use config::AdConfig;
pub use ledger::Ledger;
pub use modes::{ModeConfig, ModeId};

/// Milliseconds on the host's wall clock.
pub type Millis = u64;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted from the host (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Minimum time between accepted taps (seconds)
    pub const INPUT_DEBOUNCE: f32 = 0.040;

    /// Speed multiplier applied on every successful stop
    pub const SPEED_GAIN: f32 = 1.03;
    /// Relative jitter applied to the speed gain (±5%)
    pub const SPEED_JITTER: f32 = 0.05;
    /// Chance the pointer reverses after a successful stop
    pub const DIRECTION_FLIP_CHANCE: f64 = 0.2;
    /// Survival modes start faster
    pub const SURVIVAL_SPEED_FACTOR: f32 = 1.17;

    /// Arc multiplier of the bigger-zone boost
    pub const BIGGER_ZONE_FACTOR: f32 = 1.5;
    /// Starting score of the head-start boost
    pub const HEAD_START_SCORE: u32 = 20;

    /// How long a memory-mode zone stays visible after placement (seconds)
    pub const MEMORY_REVEAL: f32 = 1.0;
    /// Games shorter than this never count toward play statistics (seconds)
    pub const MIN_COUNTED_GAME: f32 = 5.0;

    /// Placement rerolls before accepting a zone that covers the pointer
    pub const MAX_PLACEMENT_TRIES: u32 = 8;
}

/// Normalize an angle into [0, 2π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::TAU;
    let wrapped = ((angle % TAU) + TAU) % TAU;
    // `x % TAU + TAU` can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}
