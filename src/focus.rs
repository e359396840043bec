//! Foreground-focus change events
//!
//! An optional collaborator that reports which executable owns the
//! foreground window. The engine consumes these events to switch profiles
//! by application rule; on platforms without an implementation it simply
//! keeps the default profiles. Hosts with their own window-tracking can
//! inject any [`FocusSource`] of their choosing.

use crate::error::InputError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Emitted whenever the foreground process changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusEvent {
    /// Path to the executable that gained focus.
    pub executable: String,
}

/// Source of focus-change events.
#[async_trait::async_trait]
pub trait FocusSource: Send {
    async fn listen(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<FocusEvent>, InputError>;
}

/// Returns the built-in focus source for this platform, if any. There is
/// currently no built-in implementation on Linux; the engine then runs with
/// the default profiles and never switches.
pub fn create_focus_source() -> Option<Box<dyn FocusSource>> {
    None
}

/// A [`FocusSource`] fed by hand; used by hosts that track focus themselves
/// and by tests.
pub struct ChannelFocusSource {
    receiver: Option<mpsc::Receiver<FocusEvent>>,
}

impl ChannelFocusSource {
    /// Returns the source and the sender used to feed it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<FocusEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { receiver: Some(rx) }, tx)
    }
}

#[async_trait::async_trait]
impl FocusSource for ChannelFocusSource {
    async fn listen(
        &mut self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<FocusEvent>, InputError> {
        self.receiver
            .take()
            .ok_or_else(|| InputError::HookFailed("focus source already started".to_string()))
    }
}
