//! Store open / retry tests
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use sqlmig_core::adapters::duckdb::DuckDbStore;
use sqlmig_core::ports::MigrationStore;
use sqlmig_core::Error;

/// Concurrent opens of one database file all end up with a usable store
#[test]
fn test_concurrent_opens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.duckdb");

    {
        let store = DuckDbStore::open(&db_path).unwrap();
        store.create_ledger().unwrap();
    }

    let barrier = Arc::new(Barrier::new(3));
    let db_path = Arc::new(db_path);

    let mut handles = vec![];
    for i in 0..3 {
        let barrier = Arc::clone(&barrier);
        let db_path = Arc::clone(&db_path);

        handles.push(thread::spawn(move || {
            barrier.wait();
            let start = Instant::now();

            let result = DuckDbStore::open(&db_path).and_then(|store| {
                store.ping()?;
                thread::sleep(Duration::from_millis(100));
                store.ledger_exists()
            });

            match &result {
                Ok(_) => println!("Thread {}: opened after {:?}", i, start.elapsed()),
                Err(e) => println!("Thread {}: failed after {:?}: {}", i, start.elapsed(), e),
            }
            result.map_err(|e| e.to_string())
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in results {
        assert_eq!(result, Ok(true), "every open should see the ledger");
    }
}

/// Open, bootstrap, drop, repeat
#[test]
fn test_sequential_opens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let store = DuckDbStore::open(&db_path).unwrap();
        store.create_ledger().unwrap();
        if i == 0 {
            store.insert_ledger_entry("20250101000000_first.sql").unwrap();
        }
        assert_eq!(store.ledger_entries().unwrap().len(), 1);
        println!("Open {}: {:?}", i, start.elapsed());
    }
}

/// A path that can never be opened fails fast as a connection error
#[test]
fn test_unopenable_path_is_not_retried_forever() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("no").join("such").join("dir").join("db.duckdb");

    let start = Instant::now();
    let err = DuckDbStore::open(&db_path).err().unwrap();

    assert!(matches!(err, Error::Connection(_)), "got {err:?}");
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "non-retryable errors should not back off"
    );
}
