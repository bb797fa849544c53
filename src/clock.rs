//! Instant source injection
//!
//! The store needs a source of `created_at`/`updated_at` timestamps. Production
//! code uses the real wall clock; tests substitute a controllable one so that
//! SimpleID ordinal assignment (which is ordered by `created_at`) is
//! deterministic. There is no hidden global: the clock lives on the `Store`
//! handle and is set once at construction, optionally replaced later through
//! `Store::set_clock` for tests.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A source of instants, injected into a `Store` at construction time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: the real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) type SharedClock = Arc<dyn Clock>;

pub(crate) fn system() -> SharedClock {
    Arc::new(SystemClock)
}
