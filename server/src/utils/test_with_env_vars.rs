// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use std::env;
use std::sync::{Mutex, MutexGuard};

use lazy_static::lazy_static;

lazy_static! {
  // Tests touching the environment run one at a time.
  static ref SERIAL_TEST: Mutex<()> = Default::default();
}

/// Restores the saved values of environment variables when dropped, including during a panic.
struct EnvRestorer<'a> {
  saved: Vec<(String, Option<String>)>,
  _guard: MutexGuard<'a, ()>,
}

impl Drop for EnvRestorer<'_> {
  fn drop(&mut self) {
    for (name, value) in self.saved.drain(..) {
      match value {
        Some(value) => env::set_var(name, value),
        None => env::remove_var(name),
      }
    }
  }
}

/// Sets environment variables to the given values (None removes a variable) for the duration
/// of the closure.
pub fn with_env_vars<F: FnOnce()>(vars: Vec<(&str, Option<&str>)>, closure: F) {
  // A previous test panicking while holding the lock leaves it poisoned, which is harmless here.
  let guard = SERIAL_TEST
    .lock()
    .unwrap_or_else(|poisoned| poisoned.into_inner());

  let mut restorer = EnvRestorer {
    saved: Vec::with_capacity(vars.len()),
    _guard: guard,
  };
  for (name, value) in vars {
    restorer.saved.push((name.to_owned(), env::var(name).ok()));
    match value {
      Some(value) => env::set_var(name, value),
      None => env::remove_var(name),
    }
  }

  closure();
}
