// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for sequential `Store::resolve()` calls.

use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use memoize::{ErrorKind, Store};

#[test]
fn computes_only_once() {
    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |_: &i32| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>("cached value".to_string())
    };

    assert_eq!(store.resolve(1, compute).expect("resolve should succeed"), "cached value");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        assert_eq!(store.resolve(1, compute).expect("resolve should succeed"), "cached value");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "compute should only have been called once");
    }
}

#[test]
fn computes_once_per_key() {
    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |_: &i32| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>("value".to_string())
    };

    for (key, expected_calls) in [(1, 1), (2, 2), (3, 3)] {
        assert_eq!(store.resolve(key, compute).expect("resolve should succeed"), "value");
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }

    assert_eq!(store.resolve(1, compute).expect("resolve should succeed"), "value");
    assert_eq!(calls.load(Ordering::SeqCst), 3, "key 1 was already cached");
}

#[test]
fn value_types_have_separate_entries() {
    let store = Store::new();
    let string_calls = AtomicUsize::new(0);
    let int_calls = AtomicUsize::new(0);

    let compute_string = |_: &i32| {
        string_calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>("string value".to_string())
    };
    let compute_int = |_: &i32| {
        int_calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>(42_i64)
    };

    assert_eq!(store.resolve(1, compute_string).expect("resolve should succeed"), "string value");
    assert_eq!(store.resolve(1, compute_int).expect("resolve should succeed"), 42);
    assert_eq!(store.resolve(1, compute_string).expect("resolve should succeed"), "string value");
    assert_eq!(store.resolve(1, compute_int).expect("resolve should succeed"), 42);

    assert_eq!(string_calls.load(Ordering::SeqCst), 1);
    assert_eq!(int_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.partition_count(), 2);
}

#[test]
fn key_types_have_separate_entries() {
    let store = Store::new();

    assert_eq!(store.resolve(1_i32, |_| Ok::<_, Infallible>("from i32")).expect("resolve should succeed"), "from i32");
    assert_eq!(store.resolve(1_i64, |_| Ok::<_, Infallible>("from i64")).expect("resolve should succeed"), "from i64");
    assert_eq!(store.resolve(1_i32, |_| Ok::<_, Infallible>("other")).expect("resolve should succeed"), "from i32");
}

#[test]
fn nominally_distinct_types_have_separate_entries() {
    #[derive(Clone, Debug, PartialEq)]
    struct Celsius(f64);
    #[derive(Clone, Debug, PartialEq)]
    struct Fahrenheit(f64);

    let store = Store::new();
    let c = store.resolve("boiling", |_| Ok::<_, Infallible>(Celsius(100.0))).expect("resolve should succeed");
    let f = store.resolve("boiling", |_| Ok::<_, Infallible>(Fahrenheit(212.0))).expect("resolve should succeed");

    assert_eq!(c, Celsius(100.0));
    assert_eq!(f, Fahrenheit(212.0));
}

#[test]
fn errors_are_not_cached() {
    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |_: &i32| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= 2 {
            Err(std::io::Error::other("temporary error"))
        } else {
            Ok("success".to_string())
        }
    };

    let err = store.resolve(1, compute).expect_err("resolve should fail");
    assert_eq!(err.kind(), ErrorKind::ComputeFailed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.resolve(1, compute).expect_err("resolve should fail");
    assert_eq!(calls.load(Ordering::SeqCst), 2, "compute should run again after an error");

    assert_eq!(store.resolve(1, compute).expect("resolve should succeed"), "success");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert_eq!(store.resolve(1, compute).expect("resolve should succeed"), "success");
    assert_eq!(calls.load(Ordering::SeqCst), 3, "success should now be cached");
}

#[test]
fn compute_error_is_preserved() {
    #[derive(Debug)]
    struct NotFound(u32);

    impl std::fmt::Display for NotFound {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "record {} not found", self.0)
        }
    }

    impl std::error::Error for NotFound {}

    let store = Store::new();
    let err = store.resolve(9_u32, |id| Err::<String, _>(NotFound(*id))).expect_err("resolve should fail");

    assert_eq!(err.kind(), ErrorKind::ComputeFailed);
    assert!(err.to_string().contains("key 9"), "unexpected display: {err}");
    let cause = err
        .compute_error()
        .and_then(|e| e.downcast_ref::<NotFound>())
        .expect("original error should be reachable");
    assert_eq!(cause.0, 9);
}

#[test]
fn absent_compute_is_invalid() {
    type Loader = fn(&i32) -> Result<String, Infallible>;

    let store = Store::new();
    let err = store.resolve_with(1, None::<Loader>).expect_err("resolve should fail");

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(
        err.to_string().contains("compute function cannot be absent"),
        "unexpected display: {err}"
    );
    assert_eq!(store.resolve_with(1, None::<Loader>).unwrap_or_default(), "");
}

#[test]
fn present_optional_compute_behaves_like_resolve() {
    let store = Store::new();
    let compute = Some(|key: &i32| Ok::<_, Infallible>(key * 2));

    assert_eq!(store.resolve_with(21, compute).expect("resolve should succeed"), 42);
    assert!(store.contains::<i32, i32>(&21));
}

#[test]
fn pointer_values_are_shared() {
    #[derive(Debug)]
    struct User {
        id: u32,
        name: String,
    }

    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |id: &u32| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Infallible>(Arc::new(User {
            id: *id,
            name: "Bob".to_string(),
        }))
    };

    let first = store.resolve(1, compute).expect("resolve should succeed");
    let second = store.resolve(1, compute).expect("resolve should succeed");

    assert_eq!(first.id, 1);
    assert_eq!(first.name, "Bob");
    assert!(Arc::ptr_eq(&first, &second), "both calls should return the same allocation");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn trait_object_values() {
    trait Reader: Send + Sync {
        fn read(&self) -> String;
    }

    struct StringReader(String);

    impl Reader for StringReader {
        fn read(&self) -> String {
            self.0.clone()
        }
    }

    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |_: &u32| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<Arc<dyn Reader>, Infallible>(Arc::new(StringReader("interface value".to_string())))
    };

    assert_eq!(store.resolve(1, compute).expect("resolve should succeed").read(), "interface value");
    assert_eq!(store.resolve(1, compute).expect("resolve should succeed").read(), "interface value");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn none_is_cached() {
    #[derive(Debug)]
    struct Product;

    let store = Store::new();
    let calls = AtomicUsize::new(0);
    let compute = |_: &u32| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<Option<Arc<Product>>, Infallible>(None)
    };

    assert!(store.resolve(1, compute).expect("resolve should succeed").is_none());
    assert!(store.resolve(1, compute).expect("resolve should succeed").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1, "a None result should be cached like any other");
    assert!(store.contains::<u32, Option<Arc<Product>>>(&1));
}

#[test]
fn compound_keys() {
    let store = Store::new();
    let key = ("tenant-a".to_string(), 7_u16);

    let value = store
        .resolve(key.clone(), |(tenant, n)| Ok::<_, Infallible>(format!("{tenant}/{n}")))
        .expect("resolve should succeed");
    assert_eq!(value, "tenant-a/7");
    assert!(store.contains::<(String, u16), String>(&key));
}

#[test]
fn introspection_counts() {
    let store = Store::builder().name("introspection").build();
    assert!(store.is_empty());

    for key in 0..4_u8 {
        store.resolve(key, |k| Ok::<_, Infallible>(u32::from(*k))).expect("resolve should succeed");
    }
    store.resolve(0_u8, |_| Ok::<_, Infallible>('z')).expect("resolve should succeed");

    assert_eq!(store.len(), 5);
    assert_eq!(store.partition_count(), 2);
    assert_eq!(store.in_flight(), 0);
    assert!(format!("{store:?}").contains("introspection"));
}
