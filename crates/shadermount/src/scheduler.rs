//! Two-state frame scheduler.
//!
//! The scheduler is either `Idle` or `Scheduled` with exactly one token
//! outstanding at the host. Every reschedule cancels the previous token
//! first, and a delivered token is only honoured when it matches the pending
//! one, so callbacks for cancelled frames fall through harmlessly.

/// Identifies one frame callback requested from a [`FrameHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameToken(u64);

impl FrameToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Event-loop services a mount needs: a monotonic millisecond clock and
/// one-shot per-frame callbacks.
pub trait FrameHost {
    /// Monotonic timestamp in milliseconds.
    fn now(&self) -> f64;
    /// Asks the host to deliver `token` on its next frame.
    fn request_frame(&mut self) -> FrameToken;
    /// Withdraws a previously requested frame. Unknown tokens are ignored.
    fn cancel_frame(&mut self, token: FrameToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Scheduled(FrameToken),
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    state: SchedulerState,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> Option<FrameToken> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Scheduled(token) => Some(token),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, SchedulerState::Scheduled(_))
    }

    /// Requests a fresh frame, cancelling any frame still pending.
    pub fn schedule<H>(&mut self, host: &mut H) -> FrameToken
    where
        H: FrameHost + ?Sized,
    {
        if let SchedulerState::Scheduled(previous) = self.state {
            host.cancel_frame(previous);
        }
        let token = host.request_frame();
        self.state = SchedulerState::Scheduled(token);
        tracing::trace!(token = token.id(), "frame scheduled");
        token
    }

    /// Cancels the pending frame, if any. Returns whether one was pending.
    pub fn cancel<H>(&mut self, host: &mut H) -> bool
    where
        H: FrameHost + ?Sized,
    {
        match std::mem::take(&mut self.state) {
            SchedulerState::Scheduled(token) => {
                host.cancel_frame(token);
                tracing::trace!(token = token.id(), "frame cancelled");
                true
            }
            SchedulerState::Idle => false,
        }
    }

    /// Accepts a delivered frame. Only the pending token is accepted; the
    /// scheduler is `Idle` afterwards until the frame reschedules itself.
    pub fn accept(&mut self, token: FrameToken) -> bool {
        if self.state == SchedulerState::Scheduled(token) {
            self.state = SchedulerState::Idle;
            true
        } else {
            tracing::trace!(token = token.id(), "ignoring stale frame");
            false
        }
    }
}
