//! Live values - a replay-latest publish/subscribe cell.
//!
//! A [`Live`] holds the most recently published value. Subscribers receive
//! that value immediately on subscribe and every later publication after it,
//! in publication order. A transport failure is terminal: it is delivered
//! once to every subscriber and the cell accepts no further values.
//!
//! Delivery is serialized per cell. A publication made while listeners are
//! still running (from another thread, or re-entrantly from a listener) is
//! queued and delivered after the current one completes, so no subscriber
//! ever observes two publications interleaved.
//!
//! ## Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use vineyard_sync::{Live, Update};
//!
//! let seasons = Live::new(vec![2023]);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let _sub = seasons.subscribe(move |update| {
//!     if let Update::Value(years) = update {
//!         sink.lock().unwrap().push(years.clone());
//!     }
//! });
//! seasons.publish(vec![2022, 2023]);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![vec![2023], vec![2022, 2023]]);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::remote::TransportError;

/// What a subscriber is handed on each delivery.
#[derive(Debug)]
pub enum Update<'a, T> {
    Value(&'a T),
    Failed(&'a TransportError),
}

type Listener<T> = Arc<dyn Fn(Update<'_, T>) + Send + Sync>;

enum Signal<T> {
    Value(T),
    Failed(TransportError),
}

struct Pending<T> {
    /// `None` broadcasts; `Some(id)` replays to one new subscriber.
    target: Option<u64>,
    signal: Signal<T>,
}

struct State<T> {
    value: T,
    failure: Option<TransportError>,
    closed: bool,
    listeners: Vec<(u64, Listener<T>)>,
    next_listener: u64,
    pending: VecDeque<Pending<T>>,
    delivering: bool,
}

/// Replay-latest publish/subscribe cell. Cheap to clone; clones share state.
pub struct Live<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Live<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Default + Clone + Send + 'static> Default for Live<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + 'static> Live<T> {
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                value: initial,
                failure: None,
                closed: false,
                listeners: Vec::new(),
                next_listener: 1,
                pending: VecDeque::new(),
                delivering: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the latest value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Borrow the latest value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().value)
    }

    /// Terminal failure, if one was published.
    pub fn failure(&self) -> Option<TransportError> {
        self.lock().failure.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Replace the value and deliver it to every subscriber.
    ///
    /// Ignored once the cell is closed or failed.
    pub fn publish(&self, value: T) {
        {
            let mut state = self.lock();
            if state.closed || state.failure.is_some() {
                return;
            }
            state.value = value.clone();
            state.pending.push_back(Pending {
                target: None,
                signal: Signal::Value(value),
            });
        }
        self.drain();
    }

    /// Mutate the value in place, then publish the result.
    ///
    /// Returns `None` (and runs nothing) once the cell is closed or failed.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let result = {
            let mut state = self.lock();
            if state.closed || state.failure.is_some() {
                return None;
            }
            let result = f(&mut state.value);
            let value = state.value.clone();
            state.pending.push_back(Pending {
                target: None,
                signal: Signal::Value(value),
            });
            result
        };
        self.drain();
        Some(result)
    }

    /// Publish a terminal failure.
    pub fn fail(&self, error: TransportError) {
        {
            let mut state = self.lock();
            if state.closed || state.failure.is_some() {
                return;
            }
            state.failure = Some(error.clone());
            state.pending.push_back(Pending {
                target: None,
                signal: Signal::Failed(error),
            });
        }
        self.drain();
    }

    /// Stop all further deliveries and drop every listener. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.listeners.clear();
        state.pending.clear();
    }

    /// Register a listener. It first receives the latest value (or the
    /// terminal failure), then every later publication.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or cancelled.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Update<'_, T>) + Send + Sync + 'static,
    {
        let id = {
            let mut state = self.lock();
            let id = state.next_listener;
            state.next_listener += 1;
            if state.closed {
                return Subscription::inert();
            }
            state.listeners.push((id, Arc::new(listener)));
            let signal = match &state.failure {
                Some(error) => Signal::Failed(error.clone()),
                None => Signal::Value(state.value.clone()),
            };
            state.pending.push_back(Pending {
                target: Some(id),
                signal,
            });
            id
        };
        self.drain();

        let weak: Weak<Mutex<State<T>>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.listeners.retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn drain(&self) {
        {
            let mut state = self.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        let mut guard = DeliveryGuard {
            state: &self.state,
            armed: true,
        };

        loop {
            let (pending, listeners) = {
                let mut state = self.lock();
                match state.pending.pop_front() {
                    Some(pending) => {
                        let listeners: Vec<Listener<T>> = state
                            .listeners
                            .iter()
                            .filter(|(id, _)| pending.target.map_or(true, |t| t == *id))
                            .map(|(_, listener)| Arc::clone(listener))
                            .collect();
                        (pending, listeners)
                    }
                    None => {
                        state.delivering = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            for listener in listeners {
                match &pending.signal {
                    Signal::Value(value) => listener(Update::Value(value)),
                    Signal::Failed(error) => listener(Update::Failed(error)),
                }
            }
        }
    }
}

/// Releases the delivery flag when a listener unwinds mid-delivery, so later
/// publications are not stuck behind it.
struct DeliveryGuard<'a, T> {
    state: &'a Mutex<State<T>>,
    armed: bool,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .delivering = false;
        }
    }
}

/// Handle that keeps a listener registered. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub(crate) fn inert() -> Self {
        Self { cancel: None }
    }

    /// Unsubscribe now. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
