//! Game mode table
//!
//! Pure data consumed by the simulator and the ledger.

use serde::{Deserialize, Serialize};

/// Identifies a game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeId {
    Classic,
    Chaos,
    Survival,
    ZoneMobile,
    Trap,
    MemoryExpert,
}

impl ModeId {
    pub const ALL: [ModeId; 6] = [
        ModeId::Classic,
        ModeId::Chaos,
        ModeId::Survival,
        ModeId::ZoneMobile,
        ModeId::Trap,
        ModeId::MemoryExpert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeId::Classic => "classic",
            ModeId::Chaos => "chaos",
            ModeId::Survival => "survival",
            ModeId::ZoneMobile => "zone_mobile",
            ModeId::Trap => "trap",
            ModeId::MemoryExpert => "memory_expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ModeId::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

/// How the success zone(s) are laid out. Exactly one applies per mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ZoneLayout {
    /// Single zone with a constant arc (radians)
    Fixed { arc: f32 },
    /// Single zone whose arc is re-rolled on every placement
    Variable { min: f32, max: f32 },
    /// Several identical-looking zones, one of which is a trap
    Multi { count: u8, arc: f32 },
}

/// Zone drift for "zone mobile"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneDrift {
    /// Initial drift speed (rad/s)
    pub speed: f32,
    /// Drift speed added per successful stop (rad/s)
    pub gain: f32,
}

/// Static parameters of a mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub id: ModeId,
    /// Pointer speed at round start (rad/s)
    pub base_speed: f32,
    pub layout: ZoneLayout,
    /// Survival duration in seconds (survival modes only)
    pub survival: Option<f32>,
    pub drift: Option<ZoneDrift>,
    /// Zone is hidden one second after each placement
    pub memory: bool,
    /// Starting a round consumes a ticket
    pub requires_ticket: bool,
    /// Game-over coin bonus is `score / payout_divisor`
    pub payout_divisor: u32,
}

impl ModeConfig {
    /// Look up the parameters of a mode
    pub fn get(id: ModeId) -> Self {
        let classic = ModeConfig {
            id,
            base_speed: 2.4,
            layout: ZoneLayout::Fixed { arc: 0.9 },
            survival: None,
            drift: None,
            memory: false,
            requires_ticket: false,
            payout_divisor: 20,
        };

        match id {
            ModeId::Classic => classic,
            ModeId::Chaos => ModeConfig {
                layout: ZoneLayout::Variable { min: 0.35, max: 1.1 },
                ..classic
            },
            ModeId::Survival => ModeConfig {
                layout: ZoneLayout::Fixed { arc: 0.8 },
                survival: Some(30.0),
                ..classic
            },
            ModeId::ZoneMobile => ModeConfig {
                layout: ZoneLayout::Fixed { arc: 0.8 },
                drift: Some(ZoneDrift {
                    speed: 0.6,
                    gain: 0.04,
                }),
                ..classic
            },
            ModeId::Trap => ModeConfig {
                layout: ZoneLayout::Multi { count: 3, arc: 0.6 },
                ..classic
            },
            ModeId::MemoryExpert => ModeConfig {
                base_speed: 2.7,
                layout: ZoneLayout::Fixed { arc: 0.7 },
                memory: true,
                requires_ticket: true,
                payout_divisor: 10,
                ..classic
            },
        }
    }

    pub fn is_survival(&self) -> bool {
        self.survival.is_some()
    }

    /// Pointer speed for a fresh round
    pub fn start_speed(&self) -> f32 {
        if self.is_survival() {
            self.base_speed * crate::consts::SURVIVAL_SPEED_FACTOR
        } else {
            self.base_speed
        }
    }
}
