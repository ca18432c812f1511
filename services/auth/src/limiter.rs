use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Per-key attempt accounting: a fixed-window counter plus an optional
/// lockout. Process-local; the single-use code table remains the
/// correctness backstop if this state is lost on restart.
///
/// All operations take `now` explicitly so callers (and tests) control the
/// clock.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    state: Mutex<HashMap<String, AttemptState>>,
}

#[derive(Debug)]
struct AttemptState {
    count: u32,
    reset_at: DateTime<Utc>,
    lock_until: Option<DateTime<Utc>>,
}

impl AttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed-window budget check. Consumes one attempt and reports whether
    /// the key is still within `max` for the current window.
    pub fn allow(&self, key: &str, max: u32, window: Duration, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.get_mut(key) {
            if now <= entry.reset_at {
                if entry.count >= max {
                    return false;
                }
                entry.count += 1;
                return true;
            }
        }
        state.insert(
            key.to_owned(),
            AttemptState {
                count: 1,
                reset_at: now + window,
                lock_until: None,
            },
        );
        true
    }

    /// Record a failed attempt. Returns `true` when the key is locked —
    /// either it already was, or this failure reached `max` and started a
    /// lock of duration `lock`.
    pub fn register_failure(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        lock: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        let entry = state.entry(key.to_owned()).or_insert(AttemptState {
            count: 0,
            reset_at: now + window,
            lock_until: None,
        });
        if now > entry.reset_at {
            *entry = AttemptState {
                count: 0,
                reset_at: now + window,
                lock_until: None,
            };
        }

        if let Some(lock_until) = entry.lock_until {
            if now < lock_until {
                return true;
            }
        }

        entry.count += 1;
        if entry.count >= max {
            entry.lock_until = Some(now + lock);
            return true;
        }
        false
    }

    /// True iff the key is currently locked out.
    pub fn is_locked(&self, key: &str, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().unwrap();
        state
            .get(key)
            .and_then(|entry| entry.lock_until)
            .is_some_and(|until| now < until)
    }

    /// Forget everything about a key.
    pub fn reset(&self, key: &str) {
        self.state.lock().unwrap().remove(key);
    }
}
