//! Time source for stores.

use chrono::{DateTime, TimeZone, Utc};

/// Source of "now" for id assignment, timestamps and edit windows.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to milliseconds so stored timestamps round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    truncate_millis(Utc::now())
  }
}

/// Drop sub-millisecond precision.
pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
  Utc
    .timestamp_millis_opt(at.timestamp_millis())
    .single()
    .unwrap_or(at)
}

#[cfg(test)]
pub mod testing {
  use super::*;
  use std::sync::Mutex;

  /// Manually advanced clock for tests.
  pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
  }

  impl ManualClock {
    pub fn at(millis: i64) -> Self {
      Self {
        now: Mutex::new(Utc.timestamp_millis_opt(millis).unwrap()),
      }
    }

    pub fn set(&self, at: DateTime<Utc>) {
      *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
      let mut now = self.now.lock().unwrap();
      *now += by;
    }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_system_clock_has_millisecond_precision() {
    let now = SystemClock.now();
    assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
  }
}
