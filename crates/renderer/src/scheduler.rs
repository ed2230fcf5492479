//! Frame-pacing port.
//!
//! The engine never sleeps or loops on its own. It asks a [`FrameScheduler`]
//! for one callback at the next display refresh, and the host answers by
//! calling [`crate::RenderEngine::on_frame`] with the handle it issued.

use std::cell::RefCell;
use std::rc::Rc;

/// Identifies one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

pub trait FrameScheduler {
    /// Requests one callback at the next frame boundary.
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraws a pending request. Unknown or already-fired handles are
    /// ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Tracks the single outstanding request of a host-driven frame source.
#[derive(Debug, Default)]
pub struct PendingFrame {
    next_id: u64,
    pending: Option<FrameHandle>,
}

impl PendingFrame {
    pub fn request(&mut self) -> FrameHandle {
        self.next_id = self.next_id.wrapping_add(1);
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    pub fn cancel(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    /// Takes the pending request, if any, for the host to fire.
    pub fn take(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    pub fn peek(&self) -> Option<FrameHandle> {
        self.pending
    }
}

/// Scheduler whose frames fire only when the caller says so.
///
/// Clones share state, so a test can keep one copy while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameClock {
    state: Rc<RefCell<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    frames: PendingFrame,
    requested: usize,
    cancelled: usize,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the pending request so it can be fired.
    pub fn take_due(&self) -> Option<FrameHandle> {
        self.state.borrow_mut().frames.take()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.state.borrow().frames.peek()
    }

    pub fn requested(&self) -> usize {
        self.state.borrow().requested
    }

    pub fn cancelled(&self) -> usize {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for ManualFrameClock {
    fn request_frame(&mut self) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.requested += 1;
        state.frames.request()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        if state.frames.peek() == Some(handle) {
            state.cancelled += 1;
        }
        state.frames.cancel(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_request_issues_a_fresh_handle() {
        let mut clock = ManualFrameClock::new();
        let first = clock.request_frame();
        let second = clock.request_frame();
        assert_ne!(first, second);
        assert_eq!(clock.pending(), Some(second));
        assert_eq!(clock.requested(), 2);
    }

    #[test]
    fn cancelling_a_stale_handle_keeps_the_live_one() {
        let mut clock = ManualFrameClock::new();
        let stale = clock.request_frame();
        let live = clock.request_frame();
        clock.cancel_frame(stale);
        assert_eq!(clock.pending(), Some(live));
        clock.cancel_frame(live);
        assert_eq!(clock.take_due(), None);
        assert_eq!(clock.cancelled(), 1);
    }
}
