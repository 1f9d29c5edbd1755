//! Dispatch gate shared by a request's controller and its attempt loop

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Open,
    Closed,
    Shut,
}

/// Open/closed flag that attempts wait on before dispatch.
///
/// A closed gate holds back new attempts of a suspended request. Once the
/// request reaches a terminal state the gate is shut: it lets every waiter
/// through and ignores later open/close calls.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    state: Arc<watch::Sender<GateState>>,
}

impl DispatchGate {
    /// Create a closed gate.
    pub fn closed() -> Self {
        Self::with_state(GateState::Closed)
    }

    /// Create an open gate.
    pub fn open_gate() -> Self {
        Self::with_state(GateState::Open)
    }

    fn with_state(state: GateState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Let attempts dispatch.
    pub fn open(&self) {
        self.transition(GateState::Closed, GateState::Open);
    }

    /// Hold back new attempts.
    pub fn close(&self) {
        self.transition(GateState::Open, GateState::Closed);
    }

    /// Release all waiters for good.
    pub fn shut(&self) {
        self.state.send_replace(GateState::Shut);
    }

    /// Check if attempts may pass.
    pub fn is_open(&self) -> bool {
        *self.state.borrow() != GateState::Closed
    }

    /// Wait until the gate is open or shut.
    pub async fn wait(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = receiver.wait_for(|state| *state != GateState::Closed).await;
    }

    fn transition(&self, from: GateState, to: GateState) {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
    }
}
