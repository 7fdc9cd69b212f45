//! Thread-safe handle for hosts that finalize from more than one thread.
use parking_lot::Mutex;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::EngineError;
use crate::finalize::{FinalizeOutcome, FinalizeRequest};
use crate::store::ProgressStore;
use crate::tracker::Tracker;

/// Serializes every call through one lock, so two finalizations of the same
/// date can never interleave: the second observes the first's receipt.
#[derive(Debug)]
pub struct SharedTracker<S, C> {
    inner: Arc<Mutex<Tracker<S, C>>>,
}

impl<S, C> Clone for SharedTracker<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> SharedTracker<S, C>
where
    S: ProgressStore,
    C: Clock,
{
    #[must_use]
    pub fn new(tracker: Tracker<S, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    /// # Errors
    ///
    /// See [`Tracker::finalize_day`].
    pub fn finalize_day(&self, request: &FinalizeRequest) -> Result<FinalizeOutcome, EngineError> {
        self.inner.lock().finalize_day(request)
    }

    /// Run `f` with exclusive access to the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&mut Tracker<S, C>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::EngineConfig;
    use crate::scoring::CompletionInput;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use std::thread;

    #[test]
    fn concurrent_same_date_finalize_commits_once() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let config = Arc::new(EngineConfig::load_from_static().unwrap());
        let store = MemoryStore::new();
        let tracker = Tracker::open(config, store.clone(), FixedClock::on(day)).unwrap();
        let shared = SharedTracker::new(tracker);

        let request = shared.with(|tracker| {
            tracker
                .score_day(
                    day,
                    &[
                        CompletionInput::done("squash_50").with_achieved(120),
                        CompletionInput::done("writing").with_flag("deep"),
                    ],
                    &[],
                )
                .unwrap()
                .into_request()
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                let request = request.clone();
                thread::spawn(move || shared.finalize_day(&request).unwrap())
            })
            .collect();
        let outcomes: Vec<FinalizeOutcome> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let committed = outcomes.iter().filter(|o| !o.is_replay()).count();
        assert_eq!(committed, 1);
        assert_eq!(store.commit_count(), 1);
        let total = shared.with(|tracker| tracker.state().ledger.total_xp());
        assert_eq!(total, 75 + 60);
    }
}
