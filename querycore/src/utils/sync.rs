// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(loom))]
pub(crate) use std::sync::Arc;

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(loom)]
pub(crate) use loom::sync::Arc;

// The point pool free list is only ever held for a push or a pop, so a non-async mutex is enough.
pub(crate) use parking_lot::Mutex;

// A call to this function will compile only if T is Send + Sync.
#[cfg(test)]
pub fn is_sync_send<T: Send + Sync>() {}

#[test]
fn test_is_sync_send() {
  is_sync_send::<u32>();
  is_sync_send::<Mutex<Vec<u32>>>();
  is_sync_send::<Arc<AtomicUsize>>();
}
