// Render lifecycle state and its cross-thread cell

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RenderState {
    /// No render active
    Idle = 0,
    /// Engine computing
    Busy = 1,
    /// Engine completed all requested work; image is final
    Finished = 2,
    /// Cancellation in flight, becomes `Idle` once cleanup completes
    Stopped = 3,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RenderState::Busy,
            2 => RenderState::Finished,
            3 => RenderState::Stopped,
            _ => RenderState::Idle,
        }
    }

    /// States a new render may start from
    pub fn accepts_start(self) -> bool {
        !matches!(self, RenderState::Busy)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// `Idle -> Busy -> {Finished, Stopped} -> Idle`, plus restarts from
    /// `Finished`/`Stopped` and the forced `Busy -> Idle` used on failures.
    pub fn can_transition_to(self, next: RenderState) -> bool {
        use RenderState::*;
        matches!(
            (self, next),
            (Idle, Busy)
                | (Finished, Busy)
                | (Stopped, Busy)
                | (Busy, Finished)
                | (Busy, Stopped)
                | (Busy, Idle)
                | (Finished, Idle)
                | (Stopped, Idle)
        )
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderState::Idle => "IDLE",
            RenderState::Busy => "BUSY",
            RenderState::Finished => "FINISHED",
            RenderState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Atomically visible render state with publish/subscribe
pub struct StateCell {
    value: AtomicU8,
    // Serialises commits so subscribers see them in order; also the condvar lock.
    gate: Mutex<()>,
    changed: Condvar,
    subscribers: Mutex<Vec<Sender<RenderState>>>,
}

impl StateCell {
    pub fn new(initial: RenderState) -> Self {
        Self {
            value: AtomicU8::new(initial as u8),
            gate: Mutex::new(()),
            changed: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Current state; never blocks
    pub fn get(&self) -> RenderState {
        RenderState::from_u8(self.value.load(Ordering::Acquire))
    }

    /// Commit `from -> to` only if the cell still holds `from`.
    ///
    /// Returns the state actually observed when the swap failed.
    pub fn transition(&self, from: RenderState, to: RenderState) -> Result<(), RenderState> {
        debug_assert!(from.can_transition_to(to), "illegal edge {from} -> {to}");
        let gate = self.gate.lock();
        match self
            .value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.publish(to);
                self.changed.notify_all();
                drop(gate);
                Ok(())
            }
            Err(actual) => Err(RenderState::from_u8(actual)),
        }
    }

    /// Unconditionally move to `to`, used by failure paths to leave `Busy`.
    ///
    /// Returns the previous state.
    pub fn force(&self, to: RenderState) -> RenderState {
        let gate = self.gate.lock();
        let previous = RenderState::from_u8(self.value.swap(to as u8, Ordering::AcqRel));
        if previous != to {
            self.publish(to);
        }
        self.changed.notify_all();
        drop(gate);
        previous
    }

    /// Receive every committed state change from now on
    pub fn subscribe(&self) -> Receiver<RenderState> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Block until `predicate` holds or the deadline passes.
    ///
    /// `None` waits without a bound. Returns the last observed state in the
    /// error case.
    pub fn wait_until(
        &self,
        predicate: impl Fn(RenderState) -> bool,
        timeout: Option<Duration>,
    ) -> Result<RenderState, RenderState> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut gate = self.gate.lock();
        loop {
            let current = self.get();
            if predicate(current) {
                return Ok(current);
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut gate, deadline).timed_out() {
                        let current = self.get();
                        return if predicate(current) { Ok(current) } else { Err(current) };
                    }
                }
                None => self.changed.wait(&mut gate),
            }
        }
    }

    fn publish(&self, state: RenderState) {
        log::debug!("render state -> {state}");
        self.subscribers
            .lock()
            .retain(|tx| tx.send(state).is_ok());
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(RenderState::Idle)
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell").field("state", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_idle() {
        assert_eq!(StateCell::default().get(), RenderState::Idle);
    }

    #[test]
    fn lifecycle_edges() {
        use RenderState::*;
        assert!(Idle.can_transition_to(Busy));
        assert!(Busy.can_transition_to(Finished));
        assert!(Busy.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Idle));
        assert!(Finished.can_transition_to(Busy));
        assert!(!Busy.can_transition_to(Busy));
        assert!(!Idle.can_transition_to(Finished));
        assert!(!Idle.can_transition_to(Stopped));
    }

    #[test]
    fn only_busy_rejects_start() {
        assert!(RenderState::Idle.accepts_start());
        assert!(RenderState::Finished.accepts_start());
        assert!(RenderState::Stopped.accepts_start());
        assert!(!RenderState::Busy.accepts_start());
    }

    #[test]
    fn failed_transition_reports_actual_state() {
        let cell = StateCell::new(RenderState::Busy);
        cell.transition(RenderState::Busy, RenderState::Stopped).unwrap();
        let err = cell
            .transition(RenderState::Busy, RenderState::Finished)
            .unwrap_err();
        assert_eq!(err, RenderState::Stopped);
        assert_eq!(cell.get(), RenderState::Stopped);
    }

    #[test]
    fn subscribers_see_committed_changes_in_order() {
        let cell = StateCell::default();
        let rx = cell.subscribe();
        cell.transition(RenderState::Idle, RenderState::Busy).unwrap();
        cell.transition(RenderState::Busy, RenderState::Stopped).unwrap();
        cell.transition(RenderState::Stopped, RenderState::Idle).unwrap();

        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![RenderState::Busy, RenderState::Stopped, RenderState::Idle]
        );
    }

    #[test]
    fn force_to_same_state_is_silent() {
        let cell = StateCell::default();
        let rx = cell.subscribe();
        assert_eq!(cell.force(RenderState::Idle), RenderState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn wait_until_times_out_with_current_state() {
        let cell = StateCell::new(RenderState::Busy);
        let result = cell.wait_until(|s| s == RenderState::Idle, Some(Duration::from_millis(20)));
        assert_eq!(result, Err(RenderState::Busy));
    }

    #[test]
    fn wait_until_wakes_on_other_thread() {
        let cell = Arc::new(StateCell::new(RenderState::Busy));
        let writer = Arc::clone(&cell);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer
                .transition(RenderState::Busy, RenderState::Finished)
                .unwrap();
        });

        let result = cell.wait_until(|s| s == RenderState::Finished, Some(Duration::from_secs(2)));
        assert_eq!(result, Ok(RenderState::Finished));
        handle.join().unwrap();
    }
}
