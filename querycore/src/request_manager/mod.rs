// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Query results and their wire representation.

pub mod query_response;
pub mod query_result;
