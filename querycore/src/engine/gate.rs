// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use log::debug;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::utils::error::QueryError;
use crate::utils::sync::{AtomicUsize, Ordering};

use super::context::{QueryContext, QueryPhase};

/// Admission gate bounding how many queries execute at once.
#[derive(Debug)]
pub struct Gate {
  semaphore: Semaphore,
  in_flight: AtomicUsize,
  max_concurrent: usize,
}

/// A slot in the gate. The slot is released when it is done or dropped, whichever happens first.
#[derive(Debug)]
pub struct GateSlot<'a> {
  gate: &'a Gate,
  _permit: SemaphorePermit<'a>,
}

impl Gate {
  pub fn new(max_concurrent: usize) -> Self {
    Gate {
      semaphore: Semaphore::new(max_concurrent),
      in_flight: AtomicUsize::new(0),
      max_concurrent,
    }
  }

  /// Wait for a free slot, until the context is canceled or its deadline passes.
  pub async fn start(&self, ctx: &QueryContext) -> Result<GateSlot<'_>, QueryError> {
    let permit = ctx
      .run(QueryPhase::Queue, self.semaphore.acquire())
      .await?
      // The semaphore is never closed.
      .map_err(|_| QueryError::QueueCanceled)?;

    let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    debug!("Query admitted, {} of {} slots in use", in_flight, self.max_concurrent);
    Ok(GateSlot {
      gate: self,
      _permit: permit,
    })
  }

  /// Number of queries currently holding a slot.
  pub fn in_flight(&self) -> usize {
    self.in_flight.load(Ordering::SeqCst)
  }

  pub fn get_max_concurrent(&self) -> usize {
    self.max_concurrent
  }
}

impl GateSlot<'_> {
  /// Release the slot.
  pub fn done(self) {}
}

impl Drop for GateSlot<'_> {
  fn drop(&mut self) {
    self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use futures::future::join_all;

  use super::*;

  use crate::utils::sync::is_sync_send;

  #[test]
  fn test_gate_is_sync_send() {
    is_sync_send::<Gate>();
  }

  #[tokio::test]
  async fn test_start_and_done() {
    let gate = Gate::new(2);
    let ctx = QueryContext::with_timeout(Duration::from_secs(10));

    let first = gate.start(&ctx).await.unwrap();
    let second = gate.start(&ctx).await.unwrap();
    assert_eq!(gate.in_flight(), 2);

    first.done();
    assert_eq!(gate.in_flight(), 1);
    drop(second);
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(gate.get_max_concurrent(), 2);
  }

  #[tokio::test]
  async fn test_mutual_exclusion() {
    let gate = Arc::new(Gate::new(1));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let tasks = (0..8).map(|_| {
      let gate = gate.clone();
      let max_seen = max_seen.clone();
      tokio::spawn(async move {
        let ctx = QueryContext::with_timeout(Duration::from_secs(10));
        let slot = gate.start(&ctx).await.unwrap();
        max_seen.fetch_max(gate.in_flight(), Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        slot.done();
      })
    });
    for result in join_all(tasks).await {
      result.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(gate.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_queue_timeout_and_cancel() {
    let gate = Gate::new(1);
    let ctx = QueryContext::with_timeout(Duration::from_secs(10));
    let slot = gate.start(&ctx).await.unwrap();

    let expiring = QueryContext::with_timeout(Duration::from_millis(20));
    assert_eq!(
      gate.start(&expiring).await.err(),
      Some(QueryError::QueueTimeout)
    );

    let canceled = QueryContext::with_timeout(Duration::from_secs(10));
    canceled.cancel();
    assert_eq!(
      gate.start(&canceled).await.err(),
      Some(QueryError::QueueCanceled)
    );

    // Waiters that gave up do not hold a slot.
    slot.done();
    assert_eq!(gate.in_flight(), 0);
    assert!(gate.start(&ctx).await.is_ok());
  }
}
