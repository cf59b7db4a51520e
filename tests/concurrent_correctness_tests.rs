//! Concurrent Cache Correctness Tests
//!
//! These tests validate that the cache keeps its guarantees while being accessed
//! from many tasks and threads at once.
//!
//! ## Test Strategy
//!
//! Unlike benchmarks that focus on throughput, these tests:
//! - Use a multi-threaded runtime so lookups really race
//! - Count producer calls to check deduplication
//! - Check the hit/miss pair adds up to the number of lookups
//! - Use plain threads (via `scoped_threadpool`) for the synchronous API
//!
//! ## Segments
//!
//! 1. **Deduplication**: concurrent misses share a producer call
//! 2. **Thread Safety Invariants**: size bound and counters under contention

use refresh_lru::config::RefreshCacheConfig;
use refresh_lru::{Produced, ProducerError, RefreshCache};
use scoped_threadpool::Pool;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn sized(max_size: usize) -> RefreshCacheConfig {
    RefreshCacheConfig::new(NonZeroUsize::new(max_size).unwrap())
}

/// A producer answering with the key's length after a short real-time delay.
fn slow_length(calls: &Arc<AtomicUsize>) -> impl Fn(&str, ()) -> Result<Produced<usize>, ProducerError> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |key: &str, _: ()| -> Result<Produced<usize>, ProducerError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let len = key.len();
        Ok(Produced::future(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Some(len))
        }))
    }
}

// ============================================================================
// SEGMENT 1: DEDUPLICATION
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_tasks_share_one_call_per_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = RefreshCache::init(sized(64), slow_length(&calls)).unwrap();

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let key = if i % 2 == 0 { "even" } else { "odd!" };
                cache.get(key, ()).await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), Some(4));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let (hits, misses) = cache.hits_and_misses();
    assert_eq!(hits + misses, 32);
    assert!(misses >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_all_see_the_same_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let cache = RefreshCache::init(sized(8), move |_: &str, _: ()| -> Result<Produced<u32>, ProducerError> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(Produced::future(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err("backend down".into())
        }))
    })
    .unwrap();

    let lookups: Vec<_> = (0..16).map(|_| cache.get("key", ())).collect();
    for result in futures::future::join_all(lookups).await {
        let error = result.unwrap_err();
        assert_eq!(
            error.producer_error().map(|e| e.to_string()).as_deref(),
            Some("backend down")
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_empty());
}

// ============================================================================
// SEGMENT 2: THREAD SAFETY INVARIANTS
// ============================================================================

#[test]
fn test_size_bound_holds_under_contention() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let cache = RefreshCache::init(sized(16), move |key: &str, _: ()| -> Result<Produced<String>, ProducerError> {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(key.to_uppercase().into())
    })
    .unwrap();

    let num_threads = 8;
    let ops_per_thread = 500;
    let mut pool = Pool::new(num_threads);

    pool.scoped(|scope| {
        for t in 0..num_threads {
            let cache = &cache;
            scope.execute(move || {
                for i in 0..ops_per_thread {
                    let key = format!("key{}", (t as usize * 7 + i) % 40);
                    match i % 4 {
                        0 => cache.put(&key, key.to_uppercase()),
                        1 => cache.remove(&key),
                        _ => {
                            let value = futures::executor::block_on(cache.get(&key, ())).unwrap();
                            assert_eq!(value, Some(key.to_uppercase()));
                        }
                    }
                    assert!(cache.len() <= 16);
                }
            });
        }
    });

    assert!(cache.len() <= 16);
    let (hits, misses) = cache.hits_and_misses();
    assert_eq!(hits + misses, (num_threads as u64) * (ops_per_thread as u64) / 2);
    // A miss either calls the producer or joins a call in flight.
    assert!(misses as usize >= calls.load(Ordering::SeqCst));
}

#[test]
fn test_hits_and_misses_drained_concurrently() {
    let cache = RefreshCache::init(sized(4), |_: &str, _: ()| -> Result<Produced<u8>, ProducerError> {
        Ok(Produced::Value(Some(1)))
    })
    .unwrap();
    futures::executor::block_on(cache.get("a", ())).unwrap();
    let (_, first_miss) = cache.hits_and_misses();
    assert_eq!(first_miss, 1);

    let num_threads = 4;
    let ops_per_thread = 1000;
    let drained = AtomicUsize::new(0);
    let mut pool = Pool::new(num_threads + 1);

    pool.scoped(|scope| {
        for _ in 0..num_threads {
            let cache = &cache;
            scope.execute(move || {
                for _ in 0..ops_per_thread {
                    futures::executor::block_on(cache.get("a", ())).unwrap();
                }
            });
        }
        let cache = &cache;
        let drained = &drained;
        scope.execute(move || {
            for _ in 0..100 {
                let (hits, misses) = cache.hits_and_misses();
                assert_eq!(misses, 0);
                drained.fetch_add(hits as usize, Ordering::SeqCst);
            }
        });
    });

    let (hits, _) = cache.hits_and_misses();
    let total = drained.load(Ordering::SeqCst) + hits as usize;
    assert_eq!(total, num_threads as usize * ops_per_thread);
}
