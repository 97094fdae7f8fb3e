//! Debounced lookups for fields that change at keystroke rate.
//!
//! Each watched field owns a [`Debouncer`]. Every change of the field's value goes through
//! [`Debouncer::schedule`], which replaces whatever timer was pending for that field. The
//! lookup only fires once the value has been stable for the quiet period, and its result is
//! only applied if no newer change happened in the meantime.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// Where a field currently is in its lookup lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPhase {
    Idle,
    /// A timer is running; the lookup fires when it elapses.
    Pending,
    /// The lookup has been sent and we are waiting on its result.
    InFlight,
}

/// State shared between a [`Debouncer`] and the tasks it spawns.
struct FieldState {
    /// Sequence number of the most recent change. Results tagged with anything else are stale.
    latest: Mutex<u64>,
    phase: watch::Sender<LookupPhase>,
}

impl FieldState {
    fn new() -> Self {
        let (phase, _) = watch::channel(LookupPhase::Idle);
        Self {
            latest: Mutex::new(0),
            phase,
        }
    }

    /// Issues a new sequence number, invalidating every lookup issued before it.
    fn advance(&self, phase: LookupPhase) -> u64 {
        let mut latest = self.latest.lock().unwrap();
        *latest += 1;
        self.phase.send_replace(phase);
        *latest
    }

    /// Marks `seq` as in flight. Returns false if it was superseded while its timer ran.
    fn begin(&self, seq: u64) -> bool {
        let latest = self.latest.lock().unwrap();
        if *latest != seq {
            return false;
        }
        self.phase.send_replace(LookupPhase::InFlight);
        true
    }

    /// Runs `apply` only if `seq` is still the latest change for the field.
    fn finish<T, A: FnOnce(T)>(&self, field: &str, seq: u64, outcome: T, apply: A) {
        {
            let latest = self.latest.lock().unwrap();
            if *latest != seq {
                debug!(field, seq, latest = *latest, "discarding stale lookup result");
                return;
            }
        }
        apply(outcome);
    }

    /// Returns the field to `Idle` unless a newer change has taken over.
    fn settle(&self, seq: u64) {
        let latest = self.latest.lock().unwrap();
        if *latest == seq {
            self.phase.send_replace(LookupPhase::Idle);
        }
    }
}

/// Held by a lookup task from the moment its lookup is sent. Dropping it settles the field,
/// also when the lookup or the apply step panics.
struct InFlight {
    state: Arc<FieldState>,
    seq: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.settle(self.seq);
    }
}

/// Per-field debounce coordinator.
///
/// Must be used from within a tokio runtime: scheduling spawns the timer task. Dropping the
/// debouncer cancels any pending timer and discards the result of any lookup still in flight.
pub struct Debouncer {
    field: String,
    quiet_period: Duration,
    min_len: usize,
    state: Arc<FieldState>,
    // Dropping the sender wakes the timer task, which then exits without firing.
    pending: Option<oneshot::Sender<()>>,
}

impl Debouncer {
    pub fn new(field: impl Into<String>, quiet_period: Duration, min_len: usize) -> Self {
        Self {
            field: field.into(),
            quiet_period,
            min_len,
            state: Arc::new(FieldState::new()),
            pending: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn phase(&self) -> LookupPhase {
        *self.state.phase.borrow()
    }

    /// Records a change of the watched value.
    ///
    /// Cancels the field's pending timer, then, if `value` has at least `min_len` characters,
    /// starts a new one. When it elapses `lookup` runs with `value`, and `apply` receives its
    /// output unless another change (or a cancel) happened after this call. Returns whether a
    /// lookup was scheduled.
    pub fn schedule<L, Fut, T, A>(&mut self, value: &str, lookup: L, apply: A) -> bool
    where
        L: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        A: FnOnce(T) + Send + 'static,
    {
        self.pending = None;

        if value.chars().count() < self.min_len {
            self.state.advance(LookupPhase::Idle);
            debug!(field = %self.field, min_len = self.min_len, "value too short, not scheduling lookup");
            return false;
        }

        let seq = self.state.advance(LookupPhase::Pending);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.pending = Some(cancel_tx);

        let state = self.state.clone();
        let field = self.field.clone();
        let quiet_period = self.quiet_period;
        let value = value.to_owned();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => return,
                _ = tokio::time::sleep(quiet_period) => {}
            }

            if !state.begin(seq) {
                return;
            }
            let _in_flight = InFlight {
                state: state.clone(),
                seq,
            };

            debug!(field = %field, seq, value = %value, "firing lookup");
            let outcome = lookup(value).await;
            state.finish(&field, seq, outcome, apply);
        });

        true
    }

    /// Cancels the pending timer, if any, and invalidates any lookup already in flight.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.state.advance(LookupPhase::Idle);
    }

    /// Resolves once the field has no pending or in-flight lookup.
    pub async fn settled(&self) {
        let mut phase = self.state.phase.subscribe();
        let settled = phase
            .wait_for(|p| *p == LookupPhase::Idle)
            .await
            .map(|_| ());
        if let Err(err) = settled {
            warn!(field = %self.field, "lookup phase channel closed: {err}");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
