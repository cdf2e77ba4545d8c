//! Recording provider for state-machine tests

use std::cell::RefCell;
use std::rc::Rc;

use super::{AdEvents, AdKind, AdProvider, LoadTicket, ProviderError, ProviderEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Load(AdKind),
    Show(AdKind),
    Overlay(bool),
    Restore,
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub calls: Vec<Call>,
    /// Ticket of the most recent load call
    pub last_ticket: Option<LoadTicket>,
    pub fail_load: bool,
    pub fail_show: bool,
    /// Emitted synchronously from inside `show`, stamped with `show_at`
    pub emit_on_show: Vec<ProviderEvent>,
    pub show_at: u64,
}

/// Clones share one call log
#[derive(Debug, Clone)]
pub(crate) struct FakeProvider {
    pub state: Rc<RefCell<FakeState>>,
    hub: AdEvents,
    native: bool,
}

impl FakeProvider {
    pub fn new(hub: &AdEvents) -> Self {
        Self {
            state: Rc::default(),
            hub: hub.clone(),
            native: true,
        }
    }

    /// Browser build: no status-bar handling
    pub fn web(hub: &AdEvents) -> Self {
        Self {
            native: false,
            ..Self::new(hub)
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Ticket to report the latest load with
    pub fn last_ticket(&self) -> LoadTicket {
        self.state.borrow().last_ticket.unwrap_or(LoadTicket(0))
    }

    pub fn count(&self, call: &Call) -> usize {
        self.state.borrow().calls.iter().filter(|c| *c == call).count()
    }
}

impl AdProvider for FakeProvider {
    fn load(&mut self, unit: AdKind, ticket: LoadTicket) -> Result<(), ProviderError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Load(unit));
        state.last_ticket = Some(ticket);
        if state.fail_load {
            Err(ProviderError::Rejected("load refused".into()))
        } else {
            Ok(())
        }
    }

    fn show(&mut self, unit: AdKind) -> Result<(), ProviderError> {
        let (events, at) = {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::Show(unit));
            if state.fail_show {
                return Err(ProviderError::Rejected("show threw".into()));
            }
            (std::mem::take(&mut state.emit_on_show), state.show_at)
        };
        for event in events {
            self.hub.emit(unit, event, at);
        }
        Ok(())
    }

    fn is_native(&self) -> bool {
        self.native
    }

    fn set_status_bar_overlay(&mut self, overlays: bool) {
        self.state.borrow_mut().calls.push(Call::Overlay(overlays));
    }

    fn restore_status_bar(&mut self) {
        self.state.borrow_mut().calls.push(Call::Restore);
    }
}
