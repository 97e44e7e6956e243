//! Snapshot isolation and reader-pool tests
//!
//! Readers must observe a consistent snapshot while a writer commits, and
//! pool workers must each get a working read-only context. Reader processes
//! are run by re-executing this test binary.

use lmdb_simple::prelude::*;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const KEYS: usize = 50;

/// Set in child processes: the directory holding the store and the
/// hand-off marker files
const CHILD_DIR_ENV: &str = "LMDB_SIMPLE_CHILD_DIR";
const CHILD_ID_ENV: &str = "LMDB_SIMPLE_CHILD_ID";
const CHILD_READERS: usize = 2;

fn wait_for(marker: &Path) {
    let deadline = Instant::now() + Duration::from_secs(30);
    while !marker.exists() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", marker.display());
        thread::sleep(Duration::from_millis(10));
    }
}

fn seed(db: &LmdbDict, generation: u8) {
    db.update((0..KEYS).map(|i| (format!("key-{:03}", i).into_bytes(), [generation])))
        .unwrap();
}

#[test]
fn test_readers_see_consistent_snapshot_during_commit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("store");

    let writer = LmdbDict::writer(&path).unwrap();
    seed(&writer, 0);

    let reader_a = LmdbDict::reader(&path).unwrap();
    let reader_b = LmdbDict::reader(&path).unwrap();

    // Readers start their traversal, then the writer commits mid-way
    let started = Barrier::new(3);
    let committed = Barrier::new(3);

    thread::scope(|s| {
        let handles: Vec<_> = [&reader_a, &reader_b]
            .into_iter()
            .map(|reader| {
                let started = &started;
                let committed = &committed;
                s.spawn(move || {
                    let mut items = reader.items().unwrap();
                    let (_, first) = items.next().unwrap().unwrap();
                    started.wait();
                    committed.wait();

                    let mut count = 1;
                    for item in items {
                        let (_, value) = item.unwrap();
                        assert_eq!(value, first, "reader saw a partial update");
                        count += 1;
                    }
                    assert_eq!(count, KEYS);
                    first
                })
            })
            .collect();

        started.wait();
        seed(&writer, 1);
        committed.wait();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![0u8]);
        }
    });

    // A traversal started after the commit sees the new generation only
    assert!(reader_a.values().unwrap().all(|v| v.unwrap() == vec![1u8]));
}

#[test]
fn test_concurrent_readers_with_active_writer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("store");

    let writer = Arc::new(LmdbDict::writer(&path).unwrap());
    seed(&writer, 0);

    let num_readers = 4;
    let rounds = 20;
    let barrier = Arc::new(Barrier::new(num_readers + 1));

    let readers: Vec<_> = (0..num_readers)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let reader = LmdbDict::reader(&path).unwrap();
                barrier.wait();
                for _ in 0..rounds {
                    let values: Vec<Vec<u8>> =
                        reader.values().unwrap().map(|v| v.unwrap()).collect();
                    assert_eq!(values.len(), KEYS);
                    assert!(values.iter().all(|v| v == &values[0]));
                }
            })
        })
        .collect();

    barrier.wait();
    for generation in 1..=rounds as u8 {
        seed(&writer, generation);
    }

    for handle in readers {
        handle.join().unwrap();
    }
}

#[test]
fn test_reader_pool_workers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("store");
    {
        let writer = LmdbDict::writer(&path).unwrap();
        for (k, v) in [("one", 1i64), ("two", 2), ("three", 3), ("four", 4)] {
            writer.set(k.as_bytes(), &serde_json::to_vec(&v).unwrap()).unwrap();
        }
    }

    let pool = make_reader_pool(&path, 2, StoreOptions::default()).unwrap();
    let tasks: Vec<&'static str> = vec!["one", "two", "three", "four"];

    let workers: Vec<_> = (0..pool.worker_count())
        .map(|worker| {
            let init = pool.initializer();
            let tasks: Vec<&'static str> = tasks
                .iter()
                .skip(worker)
                .step_by(pool.worker_count())
                .copied()
                .collect();
            thread::spawn(move || {
                // Startup hook, then every task reuses the same context
                let ctx = init.init().unwrap();
                tasks
                    .into_iter()
                    .map(|key| {
                        ctx.run(|db| {
                            let bytes = db.get(key.as_bytes())?;
                            Ok(serde_json::from_slice::<i64>(&bytes).unwrap())
                        })
                    })
                    .collect::<Result<Vec<i64>>>()
                    .unwrap()
            })
        })
        .collect();

    let mut results: Vec<i64> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    results.sort_unstable();
    assert_eq!(results, vec![1, 2, 3, 4]);
}

/// Body of the child reader process; a no-op in a normal test run
#[test]
fn child_reader_process() {
    let Some(dir) = std::env::var_os(CHILD_DIR_ENV) else {
        return;
    };
    let dir = Path::new(&dir);
    let id = std::env::var(CHILD_ID_ENV).unwrap();

    let pool = make_reader_pool(dir.join("store"), 1, StoreOptions::default()).unwrap();
    let ctx = pool.initializer().init().unwrap();

    let mut items = ctx.reader().items().unwrap();
    let (_, first) = items.next().unwrap().unwrap();
    std::fs::write(dir.join(format!("started-{}", id)), b"").unwrap();
    wait_for(&dir.join("committed"));

    let mut count = 1;
    for item in items {
        let (_, value) = item.unwrap();
        assert_eq!(value, first, "reader process saw a partial update");
        count += 1;
    }

    let after: Vec<u8> = ctx.reader().values().unwrap().map(|v| v.unwrap()[0]).collect();
    assert!(after.iter().all(|g| *g == after[0]));

    std::fs::write(
        dir.join(format!("result-{}", id)),
        format!("{}:{}:{}", first[0], count, after[0]),
    )
    .unwrap();
}

#[test]
fn test_reader_processes_see_consistent_snapshot_during_commit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path();

    let writer = LmdbDict::writer(dir.join("store")).unwrap();
    seed(&writer, 0);

    // Each child has its own environment on the same files
    let exe = std::env::current_exe().unwrap();
    let children: Vec<_> = (0..CHILD_READERS)
        .map(|id| {
            Command::new(&exe)
                .args(["--exact", "child_reader_process", "--test-threads=1"])
                .env(CHILD_DIR_ENV, dir)
                .env(CHILD_ID_ENV, id.to_string())
                .stdout(Stdio::null())
                .spawn()
                .unwrap()
        })
        .collect();

    for id in 0..CHILD_READERS {
        wait_for(&dir.join(format!("started-{}", id)));
    }
    seed(&writer, 1);
    std::fs::write(dir.join("committed"), b"").unwrap();

    for mut child in children {
        assert!(child.wait().unwrap().success());
    }
    for id in 0..CHILD_READERS {
        let result = std::fs::read_to_string(dir.join(format!("result-{}", id))).unwrap();
        assert_eq!(result, format!("0:{}:1", KEYS));
    }
}
