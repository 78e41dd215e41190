//! Wall-clock timestamps and ticket identifier allocation.
//!
//! Timestamps have microsecond precision. [`SystemClock`] never hands out the
//! same value twice within a process: each reading is `max(now, last + 1µs)`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::model::TicketId;

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Monotonic wall clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_us: AtomicI64,
}

impl SystemClock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_us: AtomicI64::new(0),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = self.last_us.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last.saturating_add(1));
            match self
                .last_us
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return from_micros(next),
                Err(observed) => last = observed,
            }
        }
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now_us: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_us: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.now_us.fetch_add(delta, Ordering::AcqRel);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.now_us.store(to.timestamp_micros(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        from_micros(self.now_us.load(Ordering::Acquire))
    }
}

/// Convert epoch microseconds to a UTC timestamp, saturating on overflow.
#[must_use]
pub fn from_micros(us: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(us)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Number of hex characters in the random part of a ticket id.
pub const ID_HEX_LEN: usize = 12;

/// Mints `tk-<hex>` identifiers.
///
/// The hex part is a blake3 digest of the timestamp, a per-generator counter,
/// and random bits, so two generators in different processes do not collide
/// in practice. Stores still reject duplicates; callers retry on collision.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> TicketId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let salt: u64 = rand::random();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&now.timestamp_micros().to_le_bytes());
        hasher.update(&seq.to_le_bytes());
        hasher.update(&salt.to_le_bytes());
        let digest = hasher.finalize().to_hex();

        TicketId::new_unchecked(format!(
            "{}{}",
            TicketId::PREFIX,
            &digest.as_str()[..ID_HEX_LEN]
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, IdGenerator, ManualClock, SystemClock, from_micros};
    use crate::model::TicketId;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > prev, "{next} should be after {prev}");
            prev = next;
        }
    }

    #[test]
    fn system_clock_is_unique_across_threads() {
        let clock = Arc::new(SystemClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..500).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for ts in handle.join().expect("clock thread") {
                assert!(seen.insert(ts), "duplicate timestamp {ts}");
            }
        }
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn micros_roundtrip() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(from_micros(at.timestamp_micros()), at);
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let ids = IdGenerator::new();
        let now = Utc::now();
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let id = ids.next_id(now);
            assert!(TicketId::parse(id.as_str()).is_ok(), "bad id {id}");
            assert_eq!(id.as_str().len(), TicketId::PREFIX.len() + super::ID_HEX_LEN);
            assert!(seen.insert(id));
        }
    }
}
