//! Rewarded ad state machine
//!
//! ```text
//! Idle ──init──▶ Loading ──ok──▶ Ready ──show──▶ Showing
//!  ▲  ◀─fail+backoff─┘                          │    │
//!  │                                    rewarded/closed  failed
//!  │                                            ▼    │
//!  └──── preload missing ◀── Cooldown (60s) ◀───┘    └─▶ Idle (retry 1s)
//!                              │ preload ready
//!                              ▼
//!                            Ready
//! ```
//!
//! A show attempt owns its provider subscription, so every exit path
//! (reward, close, failure, timeout, teardown) detaches the listeners.

use std::mem;

use super::events::{AdEvents, ProviderEvent, Subscription};
use super::provider::{AdProvider, ProviderError};
use super::timer::TimerRegistry;
use super::{AdKind, LoadTicket, RewardKind, RewardedSignal, ShowHandle, ShowResult, ShowStatus, backoff_delay};
use crate::Millis;
use crate::config::RewardedConfig;
use crate::persistence::{KeyValueStore, load_json, save_json};

/// Observable phase of the rewarded unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardedPhase {
    Idle,
    Loading,
    Ready,
    Showing,
    Cooldown,
}

/// Background preload started when a cooldown begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preload {
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
struct ShowAttempt {
    kind: RewardKind,
    handle: ShowHandle,
    listeners: Subscription,
    showed_at: Option<Millis>,
    dismissed_at: Option<Millis>,
    earned: bool,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Loading,
    Ready,
    Showing(ShowAttempt),
    Cooldown { until: Millis, preload: Preload },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    /// Next preload attempt
    Retry,
    /// Reward seen, dismiss still missing
    RewardWait,
    /// Dismissed without reward, waiting for a late reward
    Grace,
    /// Absolute backstop for the attempt
    Safety,
    CooldownEnd,
}

/// Rewarded ad unit controller
pub struct RewardedController<P: AdProvider, S: KeyValueStore> {
    provider: P,
    events: AdEvents,
    store: S,
    config: RewardedConfig,
    signal: RewardedSignal,
    phase: Phase,
    last_shown: Option<Millis>,
    retry_count: u32,
    load_seq: u64,
    /// The only load whose outcome is still wanted
    pending_load: Option<LoadTicket>,
    timers: TimerRegistry<Timer>,
    completed: Vec<ShowResult>,
}

impl<P: AdProvider, S: KeyValueStore> RewardedController<P, S> {
    /// Build an idle controller. The last-shown timestamp is restored from
    /// `store` so a cooldown survives restarts.
    pub fn new(
        provider: P,
        events: AdEvents,
        store: S,
        config: RewardedConfig,
        signal: RewardedSignal,
    ) -> Self {
        let last_shown = match load_json::<Millis, _>(&store, &AdKind::Rewarded.last_shown_key()) {
            Ok(last) => last,
            Err(e) => {
                log::warn!("Failed to read rewarded last-shown: {}", e);
                None
            }
        };

        Self {
            provider,
            events,
            store,
            config,
            signal,
            phase: Phase::Idle,
            last_shown,
            retry_count: 0,
            load_seq: 0,
            pending_load: None,
            timers: TimerRegistry::new(),
            completed: Vec::new(),
        }
    }

    pub fn phase(&self) -> RewardedPhase {
        match self.phase {
            Phase::Idle => RewardedPhase::Idle,
            Phase::Loading => RewardedPhase::Loading,
            Phase::Ready => RewardedPhase::Ready,
            Phase::Showing(_) => RewardedPhase::Showing,
            Phase::Cooldown { .. } => RewardedPhase::Cooldown,
        }
    }

    /// A show is outstanding
    pub fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::Showing(_))
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_shown(&self) -> Option<Millis> {
        self.last_shown
    }

    /// Begin the first preload
    pub fn init(&mut self, now: Millis) {
        if matches!(self.phase, Phase::Idle) && !self.timers.is_scheduled(Timer::Retry) {
            self.start_load(now);
        }
    }

    /// Report the outcome of the preload started by `AdProvider::load`.
    /// Outcomes of superseded loads are ignored.
    pub fn preload_finished(
        &mut self,
        ticket: LoadTicket,
        result: Result<(), ProviderError>,
        now: Millis,
    ) {
        self.pump(now);
        if self.pending_load != Some(ticket) {
            log::debug!("Ignoring result of superseded rewarded load {:?}", ticket);
            return;
        }
        self.pending_load = None;

        if let Err(e) = &result {
            log::warn!("Rewarded preload failed: {}", e);
        }
        let ok = result.is_ok();

        match self.phase {
            Phase::Loading => {
                if ok {
                    log::info!("Rewarded ad ready");
                    self.retry_count = 0;
                    self.enter(Phase::Ready);
                } else {
                    self.load_failed(now);
                }
            }
            Phase::Cooldown {
                until,
                preload: Preload::Loading,
            } => {
                if ok {
                    self.retry_count = 0;
                }
                let preload = if ok { Preload::Loaded } else { Preload::Failed };
                // Same phase: keep the cooldown timer
                self.phase = Phase::Cooldown { until, preload };
            }
            _ => log::debug!("Ignoring preload result in {:?}", self.phase()),
        }
    }

    /// Show a rewarded ad. Resolves `Failed` immediately when another show is
    /// in flight, the unit is not loaded, or the cooldown has not elapsed.
    pub fn show(&mut self, kind: RewardKind, now: Millis) -> ShowHandle {
        self.pump(now);

        let rejected = ShowResult {
            status: ShowStatus::Failed,
            kind,
            resolved_at: now,
        };
        match self.phase {
            Phase::Showing(_) => {
                log::warn!("Rewarded show for {:?} rejected: another show in flight", kind);
                return ShowHandle::ready(rejected);
            }
            Phase::Ready if self.cooldown_elapsed(now) => {}
            _ => {
                log::info!(
                    "Rewarded show for {:?} rejected: {:?}, {}s cooldown left",
                    kind,
                    self.phase(),
                    self.cooldown_remaining_secs(now)
                );
                return ShowHandle::ready(rejected);
            }
        }

        self.signal.mark(now);

        // Listen before presenting: the SDK may fire synchronously
        let listeners = self.events.subscribe(AdKind::Rewarded);
        if self.provider.is_native() {
            self.provider.set_status_bar_overlay(true);
        }

        let handle = ShowHandle::pending();
        self.enter(Phase::Showing(ShowAttempt {
            kind,
            handle: handle.clone(),
            listeners,
            showed_at: None,
            dismissed_at: None,
            earned: false,
        }));
        self.timers
            .schedule(Timer::Safety, now + self.config.safety_timeout_ms);
        log::info!("Showing rewarded ad for {:?}", kind);

        match self.provider.show(AdKind::Rewarded) {
            Ok(()) => self.pump(now),
            Err(e) => {
                log::warn!("Rewarded show call failed: {}", e);
                self.resolve(ShowStatus::Failed, now);
            }
        }
        handle
    }

    /// Loaded and out of cooldown at `now`
    pub fn is_ready(&self, now: Millis) -> bool {
        match self.phase {
            Phase::Ready => self.cooldown_elapsed(now),
            Phase::Cooldown {
                until,
                preload: Preload::Loaded,
            } => now >= until && self.cooldown_elapsed(now),
            _ => false,
        }
    }

    /// Whole seconds until the cooldown ends (0 when elapsed)
    pub fn cooldown_remaining_secs(&self, now: Millis) -> u32 {
        let Some(last) = self.last_shown else {
            return 0;
        };
        let remaining = (last + self.config.cooldown_ms).saturating_sub(now);
        remaining.div_ceil(1000) as u32
    }

    /// Fire due timers and process provider events up to `now`; returns the
    /// shows that resolved since the last call
    pub fn advance(&mut self, now: Millis) -> Vec<ShowResult> {
        self.pump(now);
        mem::take(&mut self.completed)
    }

    /// Teardown: sweep timers, release listeners, fail any pending show
    pub fn shutdown(&mut self, now: Millis) {
        self.pending_load = None;
        if let Phase::Showing(attempt) = self.enter(Phase::Idle) {
            attempt.handle.resolve(ShowResult {
                status: ShowStatus::Failed,
                kind: attempt.kind,
                resolved_at: now,
            });
            if self.provider.is_native() {
                self.provider.set_status_bar_overlay(false);
            }
        }
        log::info!("Rewarded controller shut down");
    }

    fn cooldown_elapsed(&self, now: Millis) -> bool {
        self.last_shown
            .is_none_or(|last| now.saturating_sub(last) >= self.config.cooldown_ms)
    }

    /// Swap in a new phase; every transition sweeps the timers
    fn enter(&mut self, phase: Phase) -> Phase {
        self.timers.clear();
        mem::replace(&mut self.phase, phase)
    }

    /// Issue a load; any earlier outstanding load is superseded
    fn request_load(&mut self) -> Result<(), ProviderError> {
        self.load_seq += 1;
        let ticket = LoadTicket(self.load_seq);
        let requested = self.provider.load(AdKind::Rewarded, ticket);
        self.pending_load = requested.is_ok().then_some(ticket);
        requested
    }

    fn start_load(&mut self, now: Millis) {
        match self.request_load() {
            Ok(()) => {
                self.enter(Phase::Loading);
            }
            Err(e) => {
                log::warn!("Rewarded load call failed: {}", e);
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
        self.enter(Phase::Idle);
        self.timers.schedule(Timer::Retry, now + delay);
        log::info!("Rewarded preload retry #{} in {}ms", self.retry_count, delay);
    }

    fn pump(&mut self, now: Millis) {
        loop {
            let event_at = match &self.phase {
                Phase::Showing(attempt) => attempt.listeners.peek_at().filter(|at| *at <= now),
                _ => None,
            };
            let timer_at = self.timers.next_due().filter(|due| *due <= now);

            match (event_at, timer_at) {
                // Events win ties: a reward at the grace deadline still counts
                (Some(at), due) if due.is_none_or(|due| at <= due) => {
                    let event = match &self.phase {
                        Phase::Showing(attempt) => attempt.listeners.pop_until(now),
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
        let Phase::Showing(attempt) = &mut self.phase else {
            return;
        };
        log::debug!("Rewarded event {:?} at {}", event, at);

        match event {
            ProviderEvent::Showed => {
                attempt.showed_at.get_or_insert(at);
            }
            ProviderEvent::Rewarded => {
                attempt.earned = true;
                if attempt.dismissed_at.is_some() {
                    self.resolve(ShowStatus::Rewarded, at);
                } else if !self.timers.is_scheduled(Timer::RewardWait) {
                    self.timers.cancel(Timer::Grace);
                    self.timers
                        .schedule(Timer::RewardWait, at + self.config.reward_dismiss_wait_ms);
                }
            }
            ProviderEvent::Dismissed => {
                if attempt.dismissed_at.is_some() {
                    return;
                }
                attempt.dismissed_at = Some(at);
                if attempt.earned {
                    self.resolve(ShowStatus::Rewarded, at);
                    return;
                }

                let fast = self.config.fast_dismiss_ms;
                let too_fast = attempt
                    .showed_at
                    .is_none_or(|showed| at.saturating_sub(showed) < fast);
                if too_fast {
                    log::info!("Rewarded ad dismissed before it could play; treating as failure");
                    self.resolve(ShowStatus::Failed, at);
                } else {
                    self.timers.schedule(Timer::Grace, at + self.config.grace_ms);
                }
            }
            ProviderEvent::FailedToLoad | ProviderEvent::FailedToShow => {
                self.resolve(ShowStatus::Failed, at);
            }
        }
    }

    fn on_timer(&mut self, timer: Timer, due: Millis) {
        match timer {
            Timer::Retry => {
                if matches!(self.phase, Phase::Idle) {
                    self.start_load(due);
                }
            }
            Timer::RewardWait => {
                log::info!("No dismiss after reward; resolving as rewarded");
                self.resolve(ShowStatus::Rewarded, due);
            }
            Timer::Grace | Timer::Safety => {
                if timer == Timer::Safety {
                    log::warn!("Rewarded show hit the safety timeout");
                }
                let earned = matches!(&self.phase, Phase::Showing(attempt) if attempt.earned);
                let status = if earned {
                    ShowStatus::Rewarded
                } else {
                    ShowStatus::Closed
                };
                self.resolve(status, due);
            }
            Timer::CooldownEnd => match self.phase {
                Phase::Cooldown {
                    preload: Preload::Loaded,
                    ..
                } => {
                    self.enter(Phase::Ready);
                }
                Phase::Cooldown { .. } => {
                    self.enter(Phase::Idle);
                    self.start_load(due);
                }
                _ => {}
            },
        }
    }

    /// Settle the in-flight attempt exactly once
    fn resolve(&mut self, status: ShowStatus, at: Millis) {
        if !matches!(self.phase, Phase::Showing(_)) {
            return;
        }
        let Phase::Showing(attempt) = self.enter(Phase::Idle) else {
            return;
        };

        let result = ShowResult {
            status,
            kind: attempt.kind,
            resolved_at: at,
        };
        if !attempt.handle.resolve(result) {
            log::warn!("Rewarded show already resolved");
        }
        // Releases the listeners
        drop(attempt);

        if self.provider.is_native() {
            self.provider.set_status_bar_overlay(false);
        }
        log::info!("Rewarded show resolved: {:?} for {:?}", status, result.kind);
        self.completed.push(result);

        match status {
            ShowStatus::Rewarded | ShowStatus::Closed => {
                self.last_shown = Some(at);
                if let Err(e) = save_json(&self.store, &AdKind::Rewarded.last_shown_key(), &at) {
                    log::warn!("Failed to persist rewarded last-shown: {}", e);
                }

                let until = at + self.config.cooldown_ms;
                let preload = match self.request_load() {
                    Ok(()) => Preload::Loading,
                    Err(e) => {
                        log::warn!("Rewarded load call failed: {}", e);
                        Preload::Failed
                    }
                };
                self.enter(Phase::Cooldown { until, preload });
                self.timers.schedule(Timer::CooldownEnd, until);
            }
            ShowStatus::Failed => {
                self.timers
                    .schedule(Timer::Retry, at + self.config.failed_show_retry_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::fake::{Call, FakeProvider};
    use crate::persistence::MemoryStore;

    type Controller = RewardedController<FakeProvider, MemoryStore>;

    fn controller(store: MemoryStore) -> (Controller, FakeProvider, AdEvents, RewardedSignal) {
        let hub = AdEvents::new();
        let provider = FakeProvider::new(&hub);
        let signal = RewardedSignal::new();
        let ctrl = RewardedController::new(
            provider.clone(),
            hub.clone(),
            store,
            RewardedConfig::default(),
            signal.clone(),
        );
        (ctrl, provider, hub, signal)
    }

    fn ready() -> (Controller, FakeProvider, AdEvents) {
        let (mut ctrl, provider, hub, _) = controller(MemoryStore::new());
        ctrl.init(0);
        ctrl.preload_finished(provider.last_ticket(), Ok(()), 0);
        assert_eq!(ctrl.phase(), RewardedPhase::Ready);
        (ctrl, provider, hub)
    }

    fn emit(hub: &AdEvents, event: ProviderEvent, at: Millis) {
        hub.emit(AdKind::Rewarded, event, at);
    }

    #[test]
    fn test_init_starts_loading() {
        let (mut ctrl, provider, _, _) = controller(MemoryStore::new());
        assert_eq!(ctrl.phase(), RewardedPhase::Idle);
        ctrl.init(0);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        assert_eq!(provider.calls(), vec![Call::Load(AdKind::Rewarded)]);
        assert!(!ctrl.is_ready(0));
    }

    #[test]
    fn test_preload_failures_back_off_with_cap() {
        let (mut ctrl, provider, _, _) = controller(MemoryStore::new());
        provider.state.borrow_mut().fail_load = true;
        ctrl.init(0);
        assert_eq!(ctrl.phase(), RewardedPhase::Idle);
        assert_eq!(ctrl.timers.due_at(Timer::Retry), Some(1000));

        let mut now = 1000;
        for expected in [2000, 4000, 8000, 16_000, 30_000, 30_000] {
            ctrl.advance(now);
            let due = ctrl.timers.due_at(Timer::Retry).unwrap();
            assert_eq!(due - now, expected);
            now = due;
        }
        assert_eq!(ctrl.retry_count(), 7);

        // Recovery resets the counter
        provider.state.borrow_mut().fail_load = false;
        ctrl.advance(now);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        ctrl.preload_finished(provider.last_ticket(), Ok(()), now);
        assert_eq!(ctrl.retry_count(), 0);
        assert!(ctrl.is_ready(now));
    }

    #[test]
    fn test_async_preload_failure_schedules_retry() {
        let (mut ctrl, provider, _, _) = controller(MemoryStore::new());
        ctrl.init(0);
        ctrl.preload_finished(
            provider.last_ticket(),
            Err(ProviderError::NotLoaded(AdKind::Rewarded)),
            500,
        );
        assert_eq!(ctrl.phase(), RewardedPhase::Idle);
        assert_eq!(ctrl.timers.due_at(Timer::Retry), Some(1500));
        ctrl.advance(1500);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        assert_eq!(provider.count(&Call::Load(AdKind::Rewarded)), 2);
    }

    #[test]
    fn test_reward_then_dismiss_resolves_rewarded_on_dismiss() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        assert!(ctrl.in_flight());

        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Rewarded, 2000);
        emit(&hub, ProviderEvent::Dismissed, 2100);

        assert!(ctrl.advance(2000).is_empty());
        assert!(handle.is_pending());
        let resolved = ctrl.advance(2100);
        let expected = ShowResult {
            status: ShowStatus::Rewarded,
            kind: RewardKind::Revive,
            resolved_at: 2100,
        };
        assert_eq!(resolved, vec![expected]);
        assert_eq!(handle.result(), Some(expected));
        assert_eq!(ctrl.phase(), RewardedPhase::Cooldown);
        assert_eq!(hub.listener_count(AdKind::Rewarded), 0);
    }

    #[test]
    fn test_fast_dismiss_is_failure() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::DoubleCoins, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Dismissed, 300);
        ctrl.advance(300);

        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
        // Failed shows skip the cooldown and retry the preload after 1s
        assert_eq!(ctrl.phase(), RewardedPhase::Idle);
        assert_eq!(ctrl.last_shown(), None);
        assert_eq!(ctrl.timers.due_at(Timer::Retry), Some(1300));
    }

    #[test]
    fn test_dismiss_before_showed_is_failure() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::FreeBoost, 0);
        emit(&hub, ProviderEvent::Dismissed, 5000);
        ctrl.advance(5000);
        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
    }

    #[test]
    fn test_dismiss_without_reward_waits_out_grace() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Ticket, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Dismissed, 1000);

        assert!(ctrl.advance(5999).is_empty());
        assert!(handle.is_pending());
        let resolved = ctrl.advance(6000);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, ShowStatus::Closed);
        assert_eq!(resolved[0].resolved_at, 6000);
        assert_eq!(ctrl.phase(), RewardedPhase::Cooldown);
        assert_eq!(ctrl.last_shown(), Some(6000));
    }

    #[test]
    fn test_late_reward_inside_grace_is_honoured() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Dismissed, 1000);
        ctrl.advance(2000);
        emit(&hub, ProviderEvent::Rewarded, 3000);
        ctrl.advance(3000);

        let result = handle.result().unwrap();
        assert_eq!(result.status, ShowStatus::Rewarded);
        assert_eq!(result.resolved_at, 3000);
        assert!(!ctrl.timers.is_scheduled(Timer::Grace));
    }

    #[test]
    fn test_reward_without_dismiss_forces_rewarded() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Rewarded, 2000);

        ctrl.advance(13_999);
        assert!(handle.is_pending());
        ctrl.advance(14_000);
        assert_eq!(
            handle.result().map(|r| (r.status, r.resolved_at)),
            Some((ShowStatus::Rewarded, 14_000))
        );
    }

    #[test]
    fn test_safety_timeout_resolves_closed() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        ctrl.advance(59_999);
        assert!(handle.is_pending());
        ctrl.advance(60_000);
        assert_eq!(
            handle.result().map(|r| (r.status, r.resolved_at)),
            Some((ShowStatus::Closed, 60_000))
        );
        assert_eq!(hub.listener_count(AdKind::Rewarded), 0);
    }

    #[test]
    fn test_provider_failure_event_resolves_failed() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Rewarded, 100);
        emit(&hub, ProviderEvent::FailedToShow, 200);
        ctrl.advance(200);
        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
        assert!(ctrl.timers.is_scheduled(Timer::Retry));
        assert!(!ctrl.timers.is_scheduled(Timer::Safety));
    }

    #[test]
    fn test_throwing_show_call_resolves_failed_immediately() {
        let (mut ctrl, provider, hub) = ready();
        provider.state.borrow_mut().fail_show = true;
        let handle = ctrl.show(RewardKind::Revive, 0);

        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
        assert_eq!(hub.listener_count(AdKind::Rewarded), 0);
        let calls = provider.calls();
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                Call::Overlay(true),
                Call::Show(AdKind::Rewarded),
                Call::Overlay(false)
            ]
        );
    }

    #[test]
    fn test_second_show_fails_fast_without_disturbing_first() {
        let (mut ctrl, _, hub) = ready();
        let first = ctrl.show(RewardKind::Revive, 0);
        let second = ctrl.show(RewardKind::DoubleCoins, 10);

        assert_eq!(
            second.result(),
            Some(ShowResult {
                status: ShowStatus::Failed,
                kind: RewardKind::DoubleCoins,
                resolved_at: 10,
            })
        );
        assert!(first.is_pending());
        assert_eq!(hub.listener_count(AdKind::Rewarded), 1);

        emit(&hub, ProviderEvent::Showed, 20);
        emit(&hub, ProviderEvent::Rewarded, 3000);
        emit(&hub, ProviderEvent::Dismissed, 3100);
        ctrl.advance(3100);
        assert_eq!(first.result().map(|r| r.status), Some(ShowStatus::Rewarded));
    }

    #[test]
    fn test_synchronous_dismiss_from_show_call_is_seen() {
        let (mut ctrl, provider, _) = ready();
        {
            let mut state = provider.state.borrow_mut();
            state.emit_on_show = vec![ProviderEvent::Showed, ProviderEvent::Dismissed];
            state.show_at = 0;
        }
        let handle = ctrl.show(RewardKind::Revive, 0);
        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
    }

    #[test]
    fn test_cooldown_gate() {
        let (mut ctrl, provider, hub) = ready();
        ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Rewarded, 2000);
        emit(&hub, ProviderEvent::Dismissed, 2100);
        ctrl.advance(2100);

        // Replacement preload kicked off on entering cooldown
        assert_eq!(provider.count(&Call::Load(AdKind::Rewarded)), 2);
        ctrl.preload_finished(provider.last_ticket(), Ok(()), 4000);

        assert!(!ctrl.is_ready(2100 + 59_999));
        assert!(ctrl.is_ready(2100 + 60_000));
        assert_eq!(ctrl.cooldown_remaining_secs(2100 + 30_000), 30);
        assert_eq!(ctrl.cooldown_remaining_secs(2100 + 59_001), 1);
        assert_eq!(ctrl.cooldown_remaining_secs(2100 + 60_000), 0);

        let early = ctrl.show(RewardKind::Revive, 2100 + 59_000);
        assert_eq!(early.result().map(|r| r.status), Some(ShowStatus::Failed));

        ctrl.advance(2100 + 60_000);
        assert_eq!(ctrl.phase(), RewardedPhase::Ready);
        let next = ctrl.show(RewardKind::Revive, 2100 + 60_000);
        assert!(next.is_pending());
    }

    #[test]
    fn test_cooldown_without_preload_goes_idle_then_retries() {
        let (mut ctrl, provider, hub) = ready();
        ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Dismissed, 1000);
        ctrl.advance(6000);
        assert_eq!(ctrl.phase(), RewardedPhase::Cooldown);

        ctrl.advance(66_000);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        assert_eq!(provider.count(&Call::Load(AdKind::Rewarded)), 3);
    }

    #[test]
    fn test_late_cooldown_preload_result_is_ignored() {
        let (mut ctrl, provider, hub) = ready();
        ctrl.show(RewardKind::Revive, 0);
        emit(&hub, ProviderEvent::Showed, 0);
        emit(&hub, ProviderEvent::Rewarded, 2000);
        emit(&hub, ProviderEvent::Dismissed, 2100);
        ctrl.advance(2100);
        let cooldown_load = provider.last_ticket();

        ctrl.advance(62_100);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        let replacement = provider.last_ticket();
        assert_ne!(replacement, cooldown_load);

        // The superseded load reports a failure after the retry started
        let stale = Err(ProviderError::NotLoaded(AdKind::Rewarded));
        ctrl.preload_finished(cooldown_load, stale, 62_200);
        assert_eq!(ctrl.phase(), RewardedPhase::Loading);
        assert!(!ctrl.timers.is_scheduled(Timer::Retry));

        ctrl.preload_finished(replacement, Ok(()), 62_300);
        assert_eq!(ctrl.phase(), RewardedPhase::Ready);
        assert!(ctrl.is_ready(62_300));
        assert_eq!(provider.count(&Call::Load(AdKind::Rewarded)), 3);

        // A repeated report of a finished load changes nothing
        ctrl.preload_finished(replacement, Err(ProviderError::Unavailable), 62_400);
        assert_eq!(ctrl.phase(), RewardedPhase::Ready);
    }

    #[test]
    fn test_show_marks_rewarded_signal() {
        let (mut ctrl, provider, _, signal) = controller(MemoryStore::new());
        ctrl.init(0);
        ctrl.preload_finished(provider.last_ticket(), Ok(()), 0);
        ctrl.show(RewardKind::Revive, 777);
        assert_eq!(signal.last(), Some(777));
    }

    #[test]
    fn test_cooldown_survives_restart() {
        let store = MemoryStore::new();
        {
            let (mut ctrl, provider, hub, _) = controller(store.clone());
            ctrl.init(0);
            ctrl.preload_finished(provider.last_ticket(), Ok(()), 0);
            ctrl.show(RewardKind::Revive, 0);
            emit(&hub, ProviderEvent::Showed, 0);
            emit(&hub, ProviderEvent::Rewarded, 2000);
            emit(&hub, ProviderEvent::Dismissed, 2100);
            ctrl.advance(2100);
        }

        let (mut restarted, provider, _, _) = controller(store);
        assert_eq!(restarted.last_shown(), Some(2100));
        restarted.init(10_000);
        restarted.preload_finished(provider.last_ticket(), Ok(()), 10_000);
        assert!(!restarted.is_ready(10_000));
        assert!(restarted.is_ready(62_100));
    }

    #[test]
    fn test_shutdown_fails_pending_show_and_sweeps() {
        let (mut ctrl, _, hub) = ready();
        let handle = ctrl.show(RewardKind::Revive, 0);
        ctrl.shutdown(100);
        assert_eq!(handle.result().map(|r| r.status), Some(ShowStatus::Failed));
        assert!(ctrl.timers.is_empty());
        assert_eq!(hub.listener_count(AdKind::Rewarded), 0);
        assert!(ctrl.advance(120_000).is_empty());
    }
}
