// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! The value model shared by every part of querycore.
//!
//! A series is identified by its [labels](labels::Labels) and carries [points](metric_point::Point)
//! sorted by time. Instant queries produce a [vector](vector::Vector) of samples sharing one
//! timestamp; range queries produce a [matrix](matrix::Matrix) of series sorted by labels.

pub mod constants;
pub mod labels;
pub mod matrix;
pub mod metric_point;
pub mod time_series;
pub mod vector;
