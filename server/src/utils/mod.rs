// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

//! Utilities for the haquery server.

pub(crate) mod error;
pub(crate) mod params;
pub(crate) mod settings;
pub(crate) mod shutdown;
#[cfg(test)]
pub(crate) mod test_with_env_vars;
