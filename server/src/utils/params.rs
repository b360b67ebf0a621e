// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Parsing of time and duration request parameters.

use chrono::DateTime;

use crate::utils::error::ServerError;

/// Parse a timestamp given as (possibly fractional) seconds since the epoch or as RFC 3339.
/// Returns whole seconds.
pub fn parse_time(value: &str) -> Result<i64, ServerError> {
  if let Ok(seconds) = value.parse::<f64>() {
    if seconds.is_finite() {
      return Ok(seconds.trunc() as i64);
    }
  }
  DateTime::parse_from_rfc3339(value)
    .map(|time| time.timestamp())
    .map_err(|_| ServerError::InvalidParameter(format!("cannot parse {:?} to a valid timestamp", value)))
}

/// Parse a duration given as (possibly fractional) seconds or as a number with a unit suffix
/// such as "30s", "5m" or "1h". Returns whole seconds.
pub fn parse_duration(value: &str) -> Result<i64, ServerError> {
  let invalid = || ServerError::InvalidParameter(format!("cannot parse {:?} to a valid duration", value));

  if let Ok(seconds) = value.parse::<f64>() {
    if !seconds.is_finite() {
      return Err(invalid());
    }
    return Ok(seconds.trunc() as i64);
  }

  let split = value
    .find(|c: char| !c.is_ascii_digit())
    .ok_or_else(invalid)?;
  let (number, unit) = value.split_at(split);
  let number: i64 = number.parse().map_err(|_| invalid())?;
  let multiplier = match unit {
    "s" => 1,
    "m" => 60,
    "h" => 60 * 60,
    "d" => 24 * 60 * 60,
    "w" => 7 * 24 * 60 * 60,
    "y" => 365 * 24 * 60 * 60,
    _ => return Err(invalid()),
  };
  number.checked_mul(multiplier).ok_or_else(invalid)
}
