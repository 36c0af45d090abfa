use std::cell::Cell;
use std::rc::Rc;

use crate::scheduler::{FrameHost, FrameToken};

/// Shared, manually advanced millisecond clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock(Rc<Cell<f64>>);

impl SimulatedClock {
    pub fn new(start_ms: f64) -> Self {
        Self(Rc::new(Cell::new(start_ms)))
    }

    pub fn now(&self) -> f64 {
        self.0.get()
    }

    pub fn advance(&self, delta_ms: f64) {
        self.0.set(self.0.get() + delta_ms);
    }

    pub fn set(&self, now_ms: f64) {
        self.0.set(now_ms);
    }
}

/// Frame host driven by hand: frames fire only when the caller takes them.
///
/// Keeps counters of requested and cancelled frames plus the highest number
/// of frames that were ever outstanding at once.
#[derive(Debug, Default)]
pub struct SimulatedHost {
    clock: SimulatedClock,
    next_id: u64,
    outstanding: Vec<FrameToken>,
    requested: u64,
    cancelled: u64,
    max_outstanding: usize,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: SimulatedClock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    pub fn clock(&self) -> &SimulatedClock {
        &self.clock
    }

    pub fn outstanding(&self) -> Vec<FrameToken> {
        self.outstanding.clone()
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding
    }

    /// Removes and returns the oldest outstanding frame, the way a real host
    /// consumes a callback when it fires.
    pub fn take_due(&mut self) -> Option<FrameToken> {
        if self.outstanding.is_empty() {
            None
        } else {
            Some(self.outstanding.remove(0))
        }
    }
}

impl FrameHost for SimulatedHost {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn request_frame(&mut self) -> FrameToken {
        self.next_id += 1;
        let token = FrameToken::new(self.next_id);
        self.outstanding.push(token);
        self.requested += 1;
        self.max_outstanding = self.max_outstanding.max(self.outstanding.len());
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        let before = self.outstanding.len();
        self.outstanding.retain(|pending| *pending != token);
        if self.outstanding.len() != before {
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_shared_between_clones() {
        let clock = SimulatedClock::new(10.0);
        let host = SimulatedHost::with_clock(clock.clone());
        clock.advance(5.0);
        assert_eq!(host.now(), 15.0);
    }

    #[test]
    fn take_due_consumes_in_request_order() {
        let mut host = SimulatedHost::new();
        let first = host.request_frame();
        let second = host.request_frame();
        assert_eq!(host.max_outstanding(), 2);
        assert_eq!(host.take_due(), Some(first));
        assert_eq!(host.take_due(), Some(second));
        assert_eq!(host.take_due(), None);
    }

    #[test]
    fn cancel_counts_only_known_tokens() {
        let mut host = SimulatedHost::new();
        let token = host.request_frame();
        host.cancel_frame(FrameToken::new(99));
        assert_eq!(host.cancelled(), 0);
        host.cancel_frame(token);
        assert_eq!(host.cancelled(), 1);
        assert!(host.outstanding().is_empty());
    }
}
