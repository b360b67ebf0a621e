// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

/// Bit pattern of a quiet NaN. This is what `f64::NAN` parses from "NaN" on the wire.
pub const NORMAL_NAN: u64 = 0x7ff8000000000001;

/// Bit pattern of the stale marker. It is a signalling NaN (the MSB of the mantissa is 0), so it never
/// collides with a NaN produced by arithmetic. The 2 rather than 1 makes it easy to tell apart from
/// NORMAL_NAN when debugging.
pub const STALE_NAN: u64 = 0x7ff0000000000002;

/// The label holding the metric name of a series.
pub const METRIC_NAME_LABEL: &str = "__name__";
