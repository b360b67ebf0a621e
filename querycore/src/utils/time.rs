// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use chrono::Utc;

/// Current wall-clock time as seconds since the epoch. This is the evaluation timestamp of instant queries.
pub fn get_current_time_in_seconds() -> i64 {
  Utc::now().timestamp()
}

/// Convert a duration to whole seconds, the unit used by every timestamp in a query.
pub fn duration_seconds(duration: std::time::Duration) -> i64 {
  duration.as_secs() as i64
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::time::Duration;

  #[test]
  fn test_get_current_time_in_seconds() {
    // Any date after Nov 2023 is fine.
    assert!(get_current_time_in_seconds() > 1_700_000_000);
  }

  #[test]
  fn test_duration_seconds() {
    assert_eq!(duration_seconds(Duration::from_secs(300)), 300);
    assert_eq!(duration_seconds(Duration::from_millis(1500)), 1);
  }
}
