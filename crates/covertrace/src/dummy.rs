//! Dummy ingestion traffic.
//!
//! Cover requests make genuine uploads indistinguishable on the wire. They
//! are not sent continuously: an opportunity window opens after a long
//! random delay, and inside it at most one sequence runs per session.
//!
//! ```text
//! now ──exp(opportunity)──► [ window ──────────────── duration ]
//!                              │
//!                    session ──┴─exp(start)─► req ─exp(wait)─► req ─► ...
//!                                              p[0]             p[1]
//! ```
//!
//! After the i-th request another one follows with probability `p[i]`
//! (the last probability is reused). A genuine upload cancels the sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Timing parameters of the dummy traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct DummyTrafficSettings {
    /// Mean delay before an opportunity window opens.
    pub average_opportunity_waiting_time: Duration,
    pub window_duration: Duration,
    /// Mean delay between scheduling a sequence and its first request.
    pub average_start_waiting_time: Duration,
    /// Mean delay between two requests of a sequence.
    pub average_request_waiting_time: Duration,
    pub request_probabilities: Vec<f64>,
}

/// Exponentially distributed delay with the given mean.
pub fn exponential_delay<R: Rng + ?Sized>(rng: &mut R, mean: Duration) -> Duration {
    if mean.is_zero() {
        return Duration::ZERO;
    }
    let u: f64 = rng.gen();
    let secs = -mean.as_secs_f64() * (1.0 - u).ln();
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// `date + duration`, saturating at the latest representable date.
fn add_std(date: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| date.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Period during which a dummy sequence may be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OpportunityWindow {
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: add_std(start, duration),
        }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

#[derive(Debug, Default)]
struct Session {
    window: Option<OpportunityWindow>,
    scheduled: bool,
}

/// Decides when dummy requests are sent.
///
/// The policy only makes decisions; the caller performs the requests and
/// the waits.
#[derive(Debug)]
pub struct DummyTrafficPolicy {
    settings: DummyTrafficSettings,
    session: Mutex<Session>,
    cancelled: AtomicBool,
}

impl DummyTrafficPolicy {
    pub fn new(settings: DummyTrafficSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(Session::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &DummyTrafficSettings {
        &self.settings
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> Option<OpportunityWindow> {
        self.session().window
    }

    /// Restore a window persisted by a previous process.
    pub fn set_window(&self, window: OpportunityWindow) {
        self.session().window = Some(window);
    }

    /// Open a new window after a random delay from `now`.
    pub fn reset_window<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> OpportunityWindow {
        let delay = exponential_delay(rng, self.settings.average_opportunity_waiting_time);
        let window = OpportunityWindow::new(add_std(now, delay), self.settings.window_duration);
        self.session().window = Some(window);
        window
    }

    /// Open a new window if there is none or the current one has ended.
    pub fn update_window_if_expired<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) {
        let expired = match self.window() {
            Some(window) => now > window.end,
            None => true,
        };
        if expired {
            self.reset_window(rng, now);
        }
    }

    /// Claim this session's sequence if `now` falls inside the window.
    ///
    /// Returns the delay before the first request, or `None` when no
    /// sequence should run.
    pub fn schedule<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Option<Duration> {
        let mut session = self.session();
        if session.scheduled {
            return None;
        }
        self.cancelled.store(false, Ordering::SeqCst);

        if !session.window.is_some_and(|w| w.contains(now)) {
            return None;
        }
        session.scheduled = true;
        Some(exponential_delay(rng, self.settings.average_start_waiting_time))
    }

    /// Probability of another request after `executions` earlier ones.
    pub fn continuation_probability(&self, executions: usize) -> f64 {
        let probabilities = &self.settings.request_probabilities;
        probabilities
            .get(executions)
            .or_else(|| probabilities.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Roll for another request; returns the wait before it, if any.
    pub fn next_request_delay<R: Rng + ?Sized>(&self, rng: &mut R, executions: usize) -> Option<Duration> {
        let roll: f64 = rng.gen();
        if roll >= self.continuation_probability(executions) {
            return None;
        }
        Some(exponential_delay(rng, self.settings.average_request_waiting_time))
    }

    /// Stop a running sequence before its next request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Allow another sequence to be scheduled.
    pub fn finish_sequence(&self) {
        self.session().scheduled = false;
    }

    /// The foreground session ended: cancel and release the session slot.
    pub fn end_session(&self) {
        self.session().scheduled = false;
        self.cancel();
    }
}
