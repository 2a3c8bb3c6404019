//! Abort signals and cancellation-aware awaiting.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures::future::{self, Either};
use futures::pin_mut;

use crate as adb;

#[derive(Default)]
struct State {
  reason: Option<String>,
  next_key: u64,
  wakers: Vec<(u64, Waker)>,
}

/// The aborting side of an [AbortController::new] pair.
///
/// Aborting stores a textual reason and wakes every pending [AbortSignal::aborted]
/// future. Only the first reason sticks.
pub struct AbortController {
  state: Arc<Mutex<State>>,
}

/// Observer handle for an [AbortController].
///
/// Signals are cheap to clone and all clones observe the same abort.
#[derive(Clone)]
pub struct AbortSignal {
  state: Arc<Mutex<State>>,
}

impl AbortController {
  /// Constructs a controller that has not yet been aborted.
  pub fn new() -> AbortController {
    AbortController {
      state: Arc::new(Mutex::new(State::default())),
    }
  }

  /// Returns a signal observing this controller.
  pub fn signal(&self) -> AbortSignal {
    AbortSignal {
      state: self.state.clone(),
    }
  }

  /// Aborts with the given reason, waking every pending waiter.
  pub fn abort(&self, reason: impl Into<String>) {
    let mut state = self.state.lock().unwrap();
    if state.reason.is_some() {
      return;
    }
    state.reason = Some(reason.into());
    for (_, waker) in state.wakers.drain(..) {
      waker.wake();
    }
  }
}

impl Default for AbortController {
  fn default() -> AbortController {
    AbortController::new()
  }
}

impl AbortSignal {
  /// Checks whether the controller has aborted.
  pub fn is_aborted(&self) -> bool {
    self.state.lock().unwrap().reason.is_some()
  }

  /// Returns the abort reason, if the controller has aborted.
  pub fn reason(&self) -> Option<String> {
    self.state.lock().unwrap().reason.clone()
  }

  /// Resolves with the abort reason once the controller aborts.
  ///
  /// Dropping the future unregisters its waker, so abandoned waits hold no
  /// reference inside a long-lived signal.
  pub fn aborted(&self) -> AbortFuture {
    AbortFuture {
      state: self.state.clone(),
      key: None,
    }
  }

  #[cfg(test)]
  pub(crate) fn waiter_count(&self) -> usize {
    self.state.lock().unwrap().wakers.len()
  }
}

/// Future returned by [AbortSignal::aborted].
pub struct AbortFuture {
  state: Arc<Mutex<State>>,
  key: Option<u64>,
}

impl Future for AbortFuture {
  type Output = String;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<String> {
    let this = &mut *self;
    let mut state = this.state.lock().unwrap();
    if let Some(reason) = &state.reason {
      let reason = reason.clone();
      if let Some(key) = this.key.take() {
        state.wakers.retain(|(k, _)| *k != key);
      }
      return Poll::Ready(reason);
    }

    match this.key {
      Some(key) => {
        if let Some(slot) = state.wakers.iter_mut().find(|(k, _)| *k == key) {
          slot.1 = cx.waker().clone();
        }
      }
      None => {
        let key = state.next_key;
        state.next_key += 1;
        state.wakers.push((key, cx.waker().clone()));
        this.key = Some(key);
      }
    }
    Poll::Pending
  }
}

impl Drop for AbortFuture {
  fn drop(&mut self) {
    if let Some(key) = self.key.take() {
      if let Ok(mut state) = self.state.lock() {
        state.wakers.retain(|(k, _)| *k != key);
      }
    }
  }
}

/// Awaits `op`, failing early if any of `signals` aborts first.
///
/// A signal that is already aborted short-circuits before `op` is polled. Whichever
/// way the race resolves, the losing side is dropped and its wakers unregister.
pub async fn race_with_signals<F, T>(op: F, signals: &[AbortSignal]) -> adb::Result<T>
where
  F: Future<Output = adb::Result<T>>,
{
  for signal in signals {
    if let Some(reason) = signal.reason() {
      return Err(adb::Error::Aborted(reason));
    }
  }

  if signals.is_empty() {
    return op.await;
  }

  let aborts = future::select_all(signals.iter().map(|signal| signal.aborted()));
  pin_mut!(op);
  match future::select(op, aborts).await {
    Either::Left((result, _)) => result,
    Either::Right(((reason, _, _), _)) => Err(adb::Error::Aborted(reason)),
  }
}

#[cfg(test)]
mod test {
  use futures::executor::block_on;
  use futures::future;

  use super::*;

  #[test]
  fn already_aborted_short_circuits() {
    let controller = AbortController::new();
    controller.abort("too late");
    let signal = controller.signal();

    let result: adb::Result<()> =
      block_on(race_with_signals(future::pending(), std::slice::from_ref(&signal)));
    match result {
      Err(adb::Error::Aborted(reason)) => assert_eq!(reason, "too late"),
      other => panic!("expected abort, got {:?}", other),
    }
  }

  #[test]
  fn op_wins_when_signal_is_quiet() {
    let controller = AbortController::new();
    let signal = controller.signal();

    let result = block_on(race_with_signals(
      future::ready(adb::Result::Ok(7)),
      std::slice::from_ref(&signal),
    ));
    assert_eq!(result.unwrap(), 7);
    assert_eq!(signal.waiter_count(), 0);
  }

  #[test]
  fn abort_interrupts_pending_op() {
    let controller = AbortController::new();
    let signal = controller.signal();

    let result: adb::Result<()> = block_on(async {
      let (result, _) = future::join(
        race_with_signals(future::pending(), std::slice::from_ref(&signal)),
        async { controller.abort("stop") },
      )
      .await;
      result
    });
    match result {
      Err(adb::Error::Aborted(reason)) => assert_eq!(reason, "stop"),
      other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(signal.waiter_count(), 0);
  }

  #[test]
  fn first_of_many_signals_wins() {
    let first = AbortController::new();
    let second = AbortController::new();
    let signals = [first.signal(), second.signal()];

    first.abort("first");
    second.abort("second");
    let result: adb::Result<()> = block_on(race_with_signals(future::pending(), &signals));
    match result {
      Err(adb::Error::Aborted(reason)) => assert_eq!(reason, "first"),
      other => panic!("expected abort, got {:?}", other),
    }
  }

  #[test]
  fn dropped_wait_unregisters_its_waker() {
    let controller = AbortController::new();
    let signal = controller.signal();

    block_on(async {
      let wait = signal.aborted();
      pin_mut!(wait);
      // Poll once so the waker registers, then drop the future.
      match future::select(wait, future::ready(())).await {
        Either::Right(((), _)) => {}
        Either::Left(_) => panic!("signal resolved without an abort"),
      }
    });
    assert_eq!(signal.waiter_count(), 0);
  }

  #[test]
  fn second_abort_does_not_overwrite_reason() {
    let controller = AbortController::new();
    controller.abort("first");
    controller.abort("second");
    assert_eq!(controller.signal().reason().as_deref(), Some("first"));
  }
}
