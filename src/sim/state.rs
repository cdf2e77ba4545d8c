//! Game state and core simulation types
//!
//! Everything a renderer or the ledger needs to observe lives here.

use serde::{Deserialize, Serialize};

use super::arc::ZoneArc;
use crate::modes::ModeId;

/// Lifecycle of a single round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Waiting for start
    Idle,
    /// Pointer rotating, taps are judged
    Running,
    /// Round ended; may be revived or reset
    GameOver,
}

/// Boosts selected before a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boost {
    /// Zone arcs are 1.5× wider for the whole round
    BiggerZone,
    /// Round starts at score 20
    Start20,
    /// The first miss is absorbed
    Shield,
}

impl Boost {
    pub const ALL: [Boost; 3] = [Boost::BiggerZone, Boost::Start20, Boost::Shield];

    pub fn as_str(&self) -> &'static str {
        match self {
            Boost::BiggerZone => "bigger_zone",
            Boost::Start20 => "start_20",
            Boost::Shield => "shield",
        }
    }
}

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCause {
    /// Tap outside every zone
    Miss,
    /// Tap inside the trap zone
    Trap,
    /// Survival timer ran out
    TimeUp,
}

/// Outcome of a single tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    /// Debounced, or no round running
    Ignored,
    /// Pointer was inside a valid zone
    Success { score: u32 },
    /// Miss absorbed by the shield
    Saved,
    /// Round over
    Failed(EndCause),
}

/// Transitions emitted by the simulator, drained by the ledger and the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Started {
        mode: ModeId,
        score: u32,
    },
    Hit {
        mode: ModeId,
        score: u32,
    },
    /// Shield consumed ("saved" flash)
    ShieldSaved {
        mode: ModeId,
    },
    GameOver {
        mode: ModeId,
        score: u32,
        cause: EndCause,
        /// Seconds since the round started
        duration: f32,
    },
    /// Round ended too early to count; nothing is recorded
    Discarded {
        mode: ModeId,
        duration: f32,
    },
    Revived {
        mode: ModeId,
        score: u32,
    },
    Reset {
        mode: ModeId,
    },
}

/// Mutable state of one game, owned by the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    pub mode: ModeId,
    pub status: GameStatus,
    /// Pointer angle, always in [0, 2π)
    pub pointer_angle: f32,
    /// Angular speed (rad/s, > 0)
    pub speed: f32,
    /// +1 counter-clockwise, -1 clockwise
    pub direction: f32,
    /// Success zones (one unless the mode is multi-zone)
    pub zones: Vec<ZoneArc>,
    /// Index into `zones` of the trap (multi-zone only)
    pub trap_index: Option<usize>,
    pub score: u32,
    pub active_boosts: Vec<Boost>,
    pub has_shield: bool,
    /// Survival seconds remaining
    pub time_left: Option<f32>,
    /// Current zone drift speed (zone mobile)
    pub drift_speed: f32,
    /// Memory mode: whether the zone is currently drawn
    pub memory_zone_visible: bool,
    /// Seconds since the round started
    pub elapsed: f32,
    /// Sim time of the last zone placement
    pub zone_placed_at: f32,
    /// Sim time of the last accepted tap
    #[serde(default)]
    pub last_input_at: Option<f32>,
    /// Set while the round is over
    #[serde(default)]
    pub end_cause: Option<EndCause>,
}

impl SimulationState {
    pub fn new(mode: ModeId) -> Self {
        Self {
            mode,
            status: GameStatus::Idle,
            pointer_angle: 0.0,
            speed: 0.0,
            direction: 1.0,
            zones: Vec::new(),
            trap_index: None,
            score: 0,
            active_boosts: Vec::new(),
            has_shield: false,
            time_left: None,
            drift_speed: 0.0,
            memory_zone_visible: true,
            elapsed: 0.0,
            zone_placed_at: 0.0,
            last_input_at: None,
            end_cause: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn has_boost(&self, boost: Boost) -> bool {
        self.active_boosts.contains(&boost)
    }

    /// Read-only view for rendering
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode,
            status: self.status,
            pointer_angle: self.pointer_angle,
            zones: self.zones.clone(),
            trap_index: self.trap_index,
            zone_visible: self.memory_zone_visible,
            score: self.score,
            time_left: self.time_left,
            active_boosts: self.active_boosts.clone(),
            has_shield: self.has_shield,
        }
    }
}

/// Render snapshot of the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub mode: ModeId,
    pub status: GameStatus,
    pub pointer_angle: f32,
    pub zones: Vec<ZoneArc>,
    pub trap_index: Option<usize>,
    pub zone_visible: bool,
    pub score: u32,
    pub time_left: Option<f32>,
    pub active_boosts: Vec<Boost>,
    pub has_shield: bool,
}
