// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates using `Store` to avoid a thundering herd of lookups for the same user.
//!
//! Several threads ask for the same user record at once. The first one (the leader) runs the
//! lookup while the others wait and receive a copy of its result. Later requests are served
//! straight from the store.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use memoize::Store;

#[derive(Clone, Debug)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug)]
struct LookupError(u64);

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {} does not exist", self.0)
    }
}

impl std::error::Error for LookupError {}

fn main() {
    let store = Arc::new(Store::builder().name("users").build());
    let lookups = Arc::new(AtomicUsize::new(0));

    let fetch_user = {
        let lookups = Arc::clone(&lookups);
        move |id: &u64| {
            let count = lookups.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  Looking up user {id} in the database... (lookup #{count})");

            // Simulate an expensive query
            thread::sleep(Duration::from_millis(500));

            if *id == 0 {
                return Err(LookupError(*id));
            }
            Ok(Arc::new(User {
                id: *id,
                name: "Alice".to_string(),
            }))
        }
    };

    println!("Starting 5 concurrent requests for user 123...\n");

    let handles: Vec<_> = (1..=5)
        .map(|request| {
            let store = Arc::clone(&store);
            let fetch_user = fetch_user.clone();
            let handle = thread::spawn(move || {
                let start = Instant::now();
                match store.resolve(123_u64, fetch_user) {
                    Ok(user) => println!("  [Request {request}] Got {} (#{}) in {:?}", user.name, user.id, start.elapsed()),
                    Err(e) => println!("  [Request {request}] Failed: {e}"),
                }
            });

            // Stagger the requests slightly to see the deduplication in action
            thread::sleep(Duration::from_millis(10));
            handle
        })
        .collect();

    for handle in handles {
        handle.join().expect("request thread panicked");
    }

    let start = Instant::now();
    if let Ok(user) = store.resolve(123_u64, fetch_user.clone()) {
        println!("\nA later request got {} in {:?} without a lookup.", user.name, start.elapsed());
    }

    // Failures are not stored, so every request for a missing user runs the lookup again.
    for _ in 0..2 {
        if let Err(e) = store.resolve(0_u64, fetch_user.clone()) {
            println!("Request for user 0 failed: {e}");
        }
    }

    let total = lookups.load(Ordering::SeqCst);
    println!("\nDatabase lookups executed: {total} (1 for user 123, 2 for user 0).");
}
