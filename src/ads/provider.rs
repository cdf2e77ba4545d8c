//! Native ad SDK seam

use thiserror::Error;

use super::{AdKind, LoadTicket};

/// Synchronous failures of a provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no {0:?} ad is loaded")]
    NotLoaded(AdKind),
    #[error("ad SDK unavailable on this platform")]
    Unavailable,
    #[error("ad SDK rejected the call: {0}")]
    Rejected(String),
}

/// The calls the ad state machines make into the platform SDK.
///
/// `load` and `show` only start the operation. Load completion is reported
/// back through the controller's `preload_finished`; show progress arrives as
/// `ProviderEvent`s on the shared `AdEvents` hub.
pub trait AdProvider {
    /// Begin preloading one unit. The outcome is reported back together
    /// with `ticket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK refuses to start loading.
    fn load(&mut self, unit: AdKind, ticket: LoadTicket) -> Result<(), ProviderError>;

    /// Present a loaded unit
    ///
    /// # Errors
    ///
    /// Returns an error if the native show call throws.
    fn show(&mut self, unit: AdKind) -> Result<(), ProviderError>;

    /// Whether status-bar handling applies (iOS/Android shells)
    fn is_native(&self) -> bool {
        false
    }

    /// Toggle "status bar overlays web view"
    fn set_status_bar_overlay(&mut self, _overlays: bool) {}

    /// Re-apply the app's status bar and overlay settings after an ad
    fn restore_status_bar(&mut self) {}
}

/// Provider for platforms without an ad SDK: loads always fail
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAds;

impl AdProvider for NoAds {
    fn load(&mut self, _unit: AdKind, _ticket: LoadTicket) -> Result<(), ProviderError> {
        Err(ProviderError::Unavailable)
    }

    fn show(&mut self, unit: AdKind) -> Result<(), ProviderError> {
        Err(ProviderError::NotLoaded(unit))
    }
}
