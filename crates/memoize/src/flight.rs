// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalescing of concurrent computations for the same key.
//!
//! When several threads miss on the same key, the first one (the "leader") runs the work
//! while the others (the "followers") block until it lands and then receive a copy of its
//! outcome. If the leader panics, the flight is abandoned and the followers race again: one
//! of them becomes the new leader and runs its own work.

use std::{
    fmt::{self, Debug},
    hash::Hash,
    sync::Arc,
};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

use crate::{error::SharedCause, table::Payload};

/// What every caller attached to one flight receives.
pub(crate) type Outcome = Result<Payload, SharedCause>;

/// How a caller took part in a flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    /// Ran the work.
    Leader,
    /// Waited for another caller's work.
    Follower,
}

enum State {
    Running,
    Landed(Outcome),
    Abandoned,
}

/// One in-flight computation.
struct Flight {
    state: Mutex<State>,
    landed: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::Running),
            landed: Condvar::new(),
        }
    }

    /// Blocks until the flight finishes. Returns `None` if the leader gave up.
    fn wait(&self) -> Option<Outcome> {
        let mut state = self.state.lock();
        while matches!(*state, State::Running) {
            self.landed.wait(&mut state);
        }
        match &*state {
            State::Landed(outcome) => Some(outcome.clone()),
            State::Running | State::Abandoned => None,
        }
    }
}

/// The set of in-flight computations of one partition.
pub(crate) struct Flights<K> {
    in_flight: Mutex<HashMap<K, Arc<Flight>>>,
}

impl<K> Flights<K> {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl<K> Flights<K>
where
    K: Eq + Hash + Clone,
{
    /// Runs `work` for `key` unless a flight for `key` is already in the air, in which case
    /// this call waits for that flight and returns its outcome.
    ///
    /// `work` runs without any lock held and at most once across all concurrent callers
    /// for the same key.
    pub(crate) fn run<F>(&self, key: &K, work: F) -> (Outcome, Role)
    where
        F: FnOnce() -> Outcome,
    {
        let guard = loop {
            match self.join(key) {
                Joined::Leader(guard) => break guard,
                Joined::Follower(flight) => {
                    if let Some(outcome) = flight.wait() {
                        return (outcome, Role::Follower);
                    }
                    // The leader panicked; try again, possibly as the new leader.
                }
            }
        };

        let outcome = work();
        guard.land(outcome.clone());
        (outcome, Role::Leader)
    }

    fn join(&self, key: &K) -> Joined<'_, K> {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.get(key) {
            return Joined::Follower(Arc::clone(flight));
        }

        let flight = Arc::new(Flight::new());
        in_flight.insert(key.clone(), Arc::clone(&flight));
        Joined::Leader(LeaderGuard {
            flights: self,
            key: key.clone(),
            flight,
        })
    }
}

impl<K> Debug for Flights<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flights").field("in_flight", &self.len()).finish()
    }
}

enum Joined<'a, K>
where
    K: Eq + Hash,
{
    Leader(LeaderGuard<'a, K>),
    Follower(Arc<Flight>),
}

/// Retires a flight when its leader finishes, normally or by unwinding.
struct LeaderGuard<'a, K>
where
    K: Eq + Hash,
{
    flights: &'a Flights<K>,
    key: K,
    flight: Arc<Flight>,
}

impl<K> LeaderGuard<'_, K>
where
    K: Eq + Hash,
{
    fn land(self, outcome: Outcome) {
        *self.flight.state.lock() = State::Landed(outcome);
    }
}

impl<K> Drop for LeaderGuard<'_, K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        {
            let mut in_flight = self.flights.in_flight.lock();
            if in_flight.get(&self.key).is_some_and(|current| Arc::ptr_eq(current, &self.flight)) {
                in_flight.remove(&self.key);
            }
        }

        let mut state = self.flight.state.lock();
        if matches!(*state, State::Running) {
            *state = State::Abandoned;
        }
        drop(state);
        self.flight.landed.notify_all();
    }
}
