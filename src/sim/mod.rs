//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time only advances through `tick`
//! - Seeded RNG only
//! - No rendering, storage or platform dependencies

pub mod arc;
pub mod frame;
pub mod state;
pub mod tick;

pub use arc::ZoneArc;
pub use frame::FrameClock;
pub use state::{
    Boost, EndCause, GameEvent, GameStatus, Judgment, SimulationState, Snapshot,
};
pub use tick::Simulator;
