//! Interstitial scheduler
//!
//! Shows at most one interstitial at a time, and only when the eligibility
//! gate is open: the unit is preloaded, the app has been open long enough,
//! the interstitial cooldown has elapsed, no rewarded ad began recently and
//! the session cap is not reached. The gate is checked when the show is
//! requested and again after the settle delay, right before listening.

use std::mem;

use super::events::{AdEvents, ProviderEvent, Subscription};
use super::provider::{AdProvider, ProviderError};
use super::timer::TimerRegistry;
use super::{AdKind, InterstitialHandle, LoadTicket, RewardedSignal, backoff_delay};
use crate::Millis;
use crate::config::InterstitialConfig;
use crate::persistence::{KeyValueStore, load_json, save_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preload {
    Idle,
    Loading,
    Loaded,
}

#[derive(Debug)]
enum Phase {
    Idle,
    /// Waiting out the settle delay before the show call
    Settling { handle: InterstitialHandle },
    Showing {
        handle: InterstitialHandle,
        listeners: Subscription,
        showed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Settle,
    Safety,
    Preload,
    /// Staggered status-bar restore pass
    Restore(u8),
}

/// Interstitial ad scheduler
pub struct InterstitialScheduler<P: AdProvider, S: KeyValueStore> {
    provider: P,
    events: AdEvents,
    store: S,
    config: InterstitialConfig,
    signal: RewardedSignal,
    launched_at: Millis,
    last_shown: Option<Millis>,
    session_count: u32,
    preload: Preload,
    retry_count: u32,
    load_seq: u64,
    pending_load: Option<LoadTicket>,
    phase: Phase,
    timers: TimerRegistry<Timer>,
}

impl<P: AdProvider, S: KeyValueStore> InterstitialScheduler<P, S> {
    pub fn new(
        provider: P,
        events: AdEvents,
        store: S,
        config: InterstitialConfig,
        launched_at: Millis,
    ) -> Self {
        let last_shown =
            match load_json::<Millis, _>(&store, &AdKind::Interstitial.last_shown_key()) {
                Ok(last) => last,
                Err(e) => {
                    log::warn!("Failed to read interstitial last-shown: {}", e);
                    None
                }
            };

        Self {
            provider,
            events,
            store,
            config,
            signal: RewardedSignal::new(),
            launched_at,
            last_shown,
            session_count: 0,
            preload: Preload::Idle,
            retry_count: 0,
            load_seq: 0,
            pending_load: None,
            phase: Phase::Idle,
            timers: TimerRegistry::new(),
        }
    }

    /// Signal to hand to the rewarded controller
    pub fn rewarded_signal(&self) -> RewardedSignal {
        self.signal.clone()
    }

    /// A rewarded ad began at `now`
    pub fn notify_rewarded_shown(&self, now: Millis) {
        self.signal.mark(now);
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn last_shown(&self) -> Option<Millis> {
        self.last_shown
    }

    pub fn is_preloaded(&self) -> bool {
        self.preload == Preload::Loaded
    }

    pub fn in_flight(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Begin the first preload
    pub fn init(&mut self, now: Millis) {
        if self.preload == Preload::Idle && !self.timers.is_scheduled(Timer::Preload) {
            self.start_load(now);
        }
    }

    /// Report the outcome of the preload started by `AdProvider::load`
    pub fn preload_finished(
        &mut self,
        ticket: LoadTicket,
        result: Result<(), ProviderError>,
        now: Millis,
    ) {
        self.pump(now);
        if self.preload != Preload::Loading || self.pending_load != Some(ticket) {
            log::debug!("Ignoring result of superseded interstitial load {:?}", ticket);
            return;
        }
        self.pending_load = None;
        match result {
            Ok(()) => {
                log::info!("Interstitial ad ready");
                self.retry_count = 0;
                self.preload = Preload::Loaded;
            }
            Err(e) => {
                log::warn!("Interstitial preload failed: {}", e);
                self.load_failed(now);
            }
        }
    }

    pub fn is_eligible(&self, now: Millis) -> bool {
        self.is_preloaded() && self.gate_open(now)
    }

    /// Show an interstitial if the gate is open. Resolves `false` at once
    /// when ineligible, otherwise after the settle delay and the show.
    pub fn show_if_eligible(&mut self, now: Millis) -> InterstitialHandle {
        self.pump(now);
        if self.in_flight() {
            log::info!("Interstitial skipped: another show in flight");
            return InterstitialHandle::ready(false);
        }
        if !self.is_eligible(now) {
            log::debug!("Interstitial skipped: not eligible");
            return InterstitialHandle::ready(false);
        }

        let handle = InterstitialHandle::pending();
        self.phase = Phase::Settling {
            handle: handle.clone(),
        };
        self.timers
            .schedule(Timer::Settle, now + self.config.settle_delay_ms);
        handle
    }

    /// Fire due timers and process provider events up to `now`
    pub fn advance(&mut self, now: Millis) {
        self.pump(now);
    }

    /// Teardown: sweep timers, release listeners, resolve any pending show
    pub fn shutdown(&mut self) {
        self.timers.clear();
        self.pending_load = None;
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Settling { handle } | Phase::Showing { handle, .. } => {
                handle.resolve(false);
            }
            Phase::Idle => {}
        }
        log::info!("Interstitial scheduler shut down");
    }

    fn gate_open(&self, now: Millis) -> bool {
        let config = &self.config;
        now.saturating_sub(self.launched_at) >= config.min_session_age_ms
            && self
                .last_shown
                .is_none_or(|last| now.saturating_sub(last) >= config.cooldown_ms)
            && self
                .signal
                .last()
                .is_none_or(|last| now.saturating_sub(last) >= config.rewarded_gap_ms)
            && self.session_count < config.session_cap
    }

    fn start_load(&mut self, now: Millis) {
        self.load_seq += 1;
        let ticket = LoadTicket(self.load_seq);
        match self.provider.load(AdKind::Interstitial, ticket) {
            Ok(()) => {
                self.preload = Preload::Loading;
                self.pending_load = Some(ticket);
            }
            Err(e) => {
                log::warn!("Interstitial load call failed: {}", e);
                self.load_failed(now);
            }
        }
    }

    fn load_failed(&mut self, now: Millis) {
        let delay = backoff_delay(
            self.config.backoff_base_ms,
            self.config.backoff_cap_ms,
            self.retry_count,
        );
        self.retry_count = self.retry_count.saturating_add(1);
        self.preload = Preload::Idle;
        self.timers.schedule(Timer::Preload, now + delay);
        log::info!("Interstitial preload retry #{} in {}ms", self.retry_count, delay);
    }

    fn pump(&mut self, now: Millis) {
        loop {
            let event_at = match &self.phase {
                Phase::Showing { listeners, .. } => listeners.peek_at().filter(|at| *at <= now),
                _ => None,
            };
            let timer_at = self.timers.next_due().filter(|due| *due <= now);

            match (event_at, timer_at) {
                (Some(at), due) if due.is_none_or(|due| at <= due) => {
                    let event = match &self.phase {
                        Phase::Showing { listeners, .. } => listeners.pop_until(now),
                        _ => None,
                    };
                    if let Some((event, at)) = event {
                        self.on_event(event, at);
                    }
                }
                (_, Some(_)) => {
                    if let Some((timer, due)) = self.timers.pop_due(now) {
                        self.on_timer(timer, due);
                    }
                }
                _ => break,
            }
        }
    }

    fn on_event(&mut self, event: ProviderEvent, at: Millis) {
        log::debug!("Interstitial event {:?} at {}", event, at);
        match event {
            ProviderEvent::Showed => {
                if let Phase::Showing { showed, .. } = &mut self.phase {
                    *showed = true;
                }
            }
            ProviderEvent::Dismissed => self.finish(true, at),
            ProviderEvent::FailedToLoad | ProviderEvent::FailedToShow => self.finish(false, at),
            ProviderEvent::Rewarded => {}
        }
    }

    fn on_timer(&mut self, timer: Timer, due: Millis) {
        match timer {
            Timer::Settle => self.begin_show(due),
            Timer::Safety => {
                log::warn!("Interstitial show hit the safety timeout");
                let showed = matches!(self.phase, Phase::Showing { showed: true, .. });
                self.finish(showed, due);
            }
            Timer::Preload => {
                if self.preload == Preload::Idle {
                    self.start_load(due);
                }
            }
            Timer::Restore(pass) => {
                log::debug!("Status bar restore pass {}", pass);
                self.provider.restore_status_bar();
            }
        }
    }

    fn begin_show(&mut self, at: Millis) {
        let Phase::Settling { handle } = mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };

        // A rewarded ad may have started during the settle delay
        if !self.is_eligible(at) {
            log::info!("Interstitial gate closed during settle delay");
            handle.resolve(false);
            return;
        }

        let listeners = self.events.subscribe(AdKind::Interstitial);
        self.phase = Phase::Showing {
            handle,
            listeners,
            showed: false,
        };
        self.timers
            .schedule(Timer::Safety, at + self.config.safety_timeout_ms);
        log::info!("Showing interstitial #{}", self.session_count + 1);

        if let Err(e) = self.provider.show(AdKind::Interstitial) {
            log::warn!("Interstitial show call failed: {}", e);
            self.finish(false, at);
        }
    }

    fn finish(&mut self, shown: bool, at: Millis) {
        if !matches!(self.phase, Phase::Showing { .. }) {
            return;
        }
        // Dropping the phase releases the listeners
        let Phase::Showing { handle, .. } = mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };
        handle.resolve(shown);
        self.timers.clear();

        self.last_shown = Some(at);
        self.session_count += 1;
        if let Err(e) = save_json(&self.store, &AdKind::Interstitial.last_shown_key(), &at) {
            log::warn!("Failed to persist interstitial last-shown: {}", e);
        }
        log::info!(
            "Interstitial finished (shown: {}), {} this session",
            shown,
            self.session_count
        );

        // The unit is spent either way
        self.preload = Preload::Idle;
        self.timers
            .schedule(Timer::Preload, at + self.config.preload_delay_ms);

        if self.provider.is_native() {
            for (pass, offset) in self.config.restore_offsets_ms.iter().enumerate() {
                self.timers
                    .schedule(Timer::Restore(pass as u8), at + offset);
            }
        }
    }
}
