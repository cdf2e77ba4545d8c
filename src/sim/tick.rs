//! Simulation stepping and tap judging
//!
//! Advances the pointer, drifts zones, runs the survival timer and turns taps
//! into judgments. Every random roll goes through the seeded generator.

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::arc::ZoneArc;
use super::state::{Boost, EndCause, GameEvent, GameStatus, Judgment, SimulationState, Snapshot};
use crate::consts::*;
use crate::inventory::TicketStore;
use crate::modes::{ModeConfig, ModeId, ZoneLayout};
use crate::normalize_angle;

/// Owns one game: its state, its RNG and the events it has not yet reported
pub struct Simulator {
    config: ModeConfig,
    state: SimulationState,
    rng: Pcg32,
    events: Vec<GameEvent>,
}

impl Simulator {
    /// Create an idle simulator in classic mode
    pub fn new(seed: u64) -> Self {
        let mut sim = Self {
            config: ModeConfig::get(ModeId::Classic),
            state: SimulationState::new(ModeId::Classic),
            rng: Pcg32::seed_from_u64(seed),
            events: Vec::new(),
        };
        sim.place_zones();
        sim
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn config(&self) -> &ModeConfig {
        &self.config
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Switch the idle/over simulator to another mode. Ignored while running.
    pub fn select_mode(&mut self, mode: ModeId) -> bool {
        if self.state.is_running() {
            return false;
        }
        self.config = ModeConfig::get(mode);
        self.state = SimulationState::new(mode);
        self.place_zones();
        true
    }

    /// Start a round. No-op (returns false) while a round is running or when
    /// the mode needs a ticket and none can be consumed.
    pub fn start(&mut self, mode: ModeId, boosts: &[Boost], tickets: &mut dyn TicketStore) -> bool {
        if self.state.is_running() {
            log::debug!("start({}) ignored: round already running", mode.as_str());
            return false;
        }

        let config = ModeConfig::get(mode);
        if config.requires_ticket && !tickets.consume() {
            log::info!("start({}) ignored: no ticket available", mode.as_str());
            return false;
        }

        let mut active_boosts: Vec<Boost> = boosts.to_vec();
        active_boosts.sort();
        active_boosts.dedup();

        let mut state = SimulationState::new(mode);
        state.status = GameStatus::Running;
        state.speed = config.start_speed();
        state.has_shield = active_boosts.contains(&Boost::Shield);
        state.score = if active_boosts.contains(&Boost::Start20) {
            HEAD_START_SCORE
        } else {
            0
        };
        state.time_left = config.survival;
        state.drift_speed = config.drift.map(|d| d.speed).unwrap_or(0.0);
        state.active_boosts = active_boosts;

        self.config = config;
        self.state = state;
        self.place_zones();

        log::info!(
            "Round started: mode={} speed={:.2} boosts={:?}",
            mode.as_str(),
            self.state.speed,
            self.state.active_boosts
        );
        self.events.push(GameEvent::Started {
            mode,
            score: self.state.score,
        });
        true
    }

    /// Advance the running round by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if !self.state.is_running() || !dt.is_finite() {
            return;
        }

        let state = &mut self.state;
        state.elapsed += dt.max(0.0);
        state.pointer_angle = normalize_angle(state.pointer_angle + state.speed * state.direction * dt);

        // Zones drift against the pointer
        if self.config.drift.is_some() {
            let delta = -state.direction * state.drift_speed * dt;
            for zone in &mut state.zones {
                zone.rotate(delta);
            }
        }

        if self.config.memory {
            state.memory_zone_visible = state.elapsed - state.zone_placed_at < MEMORY_REVEAL;
        }

        if let Some(time_left) = state.time_left {
            let time_left = (time_left - dt.max(0.0)).max(0.0);
            state.time_left = Some(time_left);
            if time_left <= 0.0 {
                if state.elapsed >= MIN_COUNTED_GAME {
                    self.end_round(EndCause::TimeUp);
                } else {
                    self.discard_round();
                }
            }
        }
    }

    /// Judge a tap against the current zone(s)
    pub fn on_input(&mut self) -> Judgment {
        if !self.state.is_running() {
            return Judgment::Ignored;
        }

        let now = self.state.elapsed;
        if self
            .state
            .last_input_at
            .is_some_and(|last| now - last < INPUT_DEBOUNCE)
        {
            return Judgment::Ignored;
        }
        self.state.last_input_at = Some(now);
        self.judge()
    }

    /// Judge a tap at the current pointer angle. Debouncing is left to the
    /// caller, which may hold a finer clock than the fixed step.
    pub fn judge(&mut self) -> Judgment {
        if !self.state.is_running() {
            return Judgment::Ignored;
        }

        let angle = self.state.pointer_angle;
        let hit = self.state.zones.iter().position(|z| z.contains_angle(angle));

        match hit {
            Some(index) if Some(index) == self.state.trap_index => {
                self.end_round(EndCause::Trap);
                Judgment::Failed(EndCause::Trap)
            }
            Some(_) => self.succeed(),
            None if self.state.has_shield => {
                self.state.has_shield = false;
                log::info!("Shield absorbed a miss at score {}", self.state.score);
                self.events.push(GameEvent::ShieldSaved {
                    mode: self.state.mode,
                });
                Judgment::Saved
            }
            None => {
                self.end_round(EndCause::Miss);
                Judgment::Failed(EndCause::Miss)
            }
        }
    }

    /// Back to idle with a fresh zone for the next start
    pub fn reset(&mut self) {
        let mode = self.state.mode;
        self.state = SimulationState::new(mode);
        self.place_zones();
        self.events.push(GameEvent::Reset { mode });
    }

    /// Continue a finished round without losing the score. Only valid from
    /// game over; a round that ran out of survival time cannot be revived.
    pub fn revive(&mut self) -> bool {
        if self.state.status != GameStatus::GameOver
            || self.state.end_cause == Some(EndCause::TimeUp)
        {
            return false;
        }

        let state = &mut self.state;
        state.status = GameStatus::Running;
        state.end_cause = None;
        state.zone_placed_at = state.elapsed;
        state.memory_zone_visible = true;

        log::info!("Round revived at score {}", state.score);
        self.events.push(GameEvent::Revived {
            mode: state.mode,
            score: state.score,
        });
        true
    }

    fn succeed(&mut self) -> Judgment {
        let jitter = 1.0 + self.rng.random_range(-SPEED_JITTER..=SPEED_JITTER);
        let state = &mut self.state;
        state.score += 1;
        state.speed *= SPEED_GAIN * jitter;

        if let Some(drift) = self.config.drift {
            // Direction is pinned so the zone keeps drifting against the pointer
            state.drift_speed += drift.gain;
        } else if self.rng.random_bool(DIRECTION_FLIP_CHANCE) {
            state.direction = -state.direction;
        }

        let score = state.score;
        self.place_zones();
        self.events.push(GameEvent::Hit {
            mode: self.state.mode,
            score,
        });
        Judgment::Success { score }
    }

    fn end_round(&mut self, cause: EndCause) {
        let state = &mut self.state;
        state.status = GameStatus::GameOver;
        state.end_cause = Some(cause);

        log::info!(
            "Round over: mode={} score={} cause={:?} after {:.1}s",
            state.mode.as_str(),
            state.score,
            cause,
            state.elapsed
        );
        self.events.push(GameEvent::GameOver {
            mode: state.mode,
            score: state.score,
            cause,
            duration: state.elapsed,
        });
    }

    fn discard_round(&mut self) {
        let mode = self.state.mode;
        let duration = self.state.elapsed;
        log::info!("Round discarded after {:.1}s", duration);

        self.state = SimulationState::new(mode);
        self.place_zones();
        self.events.push(GameEvent::Discarded { mode, duration });
    }

    /// Lay out zone(s) for the current mode
    fn place_zones(&mut self) {
        let scale = if self.state.has_boost(Boost::BiggerZone) {
            BIGGER_ZONE_FACTOR
        } else {
            1.0
        };

        match self.config.layout {
            ZoneLayout::Fixed { arc } => self.place_single(arc * scale),
            ZoneLayout::Variable { min, max } => {
                let arc = self.rng.random_range(min..=max);
                self.place_single(arc * scale);
            }
            ZoneLayout::Multi { count, arc } => {
                let count = count.max(2) as usize;
                let slot = TAU / count as f32;
                // Keep a gap between neighbours so zones never overlap
                let span = (arc * scale).min(slot * 0.8);
                let offset = self.rng.random_range(0.0..TAU);

                let zones = (0..count)
                    .map(|i| {
                        let jitter = self.rng.random_range(0.0..slot - span);
                        ZoneArc::with_span(offset + i as f32 * slot + jitter, span)
                    })
                    .collect();
                self.state.zones = zones;
                self.state.trap_index = Some(self.rng.random_range(0..count));
            }
        }

        self.state.zone_placed_at = self.state.elapsed;
        self.state.memory_zone_visible = true;
    }

    fn place_single(&mut self, span: f32) {
        let span = span.min(TAU * 0.5);
        let pointer = self.state.pointer_angle;

        let mut zone = ZoneArc::with_span(self.rng.random_range(0.0..TAU), span);
        for _ in 1..MAX_PLACEMENT_TRIES {
            if !zone.contains_angle(pointer) {
                break;
            }
            zone = ZoneArc::with_span(self.rng.random_range(0.0..TAU), span);
        }

        self.state.zones = vec![zone];
        self.state.trap_index = None;
    }
}
