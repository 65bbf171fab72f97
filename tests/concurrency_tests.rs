//! Concurrency Tests for the Cache Engine
//!
//! Drives the refresh protocol from real threads: one refresher per stale
//! entry, waiters released by put, cancel and remove, and no deadlock
//! under mixed load.

use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use refresh_cache::cache::{AccessKind, CacheEngine, PolicyKind, INDEFINITE_EXPIRY};

const THREADS: usize = 8;
const WAITERS: usize = 4;

fn engine(blocking: bool) -> Arc<CacheEngine<String>> {
    Arc::new(
        CacheEngine::builder()
            .policy(PolicyKind::Lru)
            .capacity(100)
            .blocking(blocking)
            .build(),
    )
}

fn spawn_lookups(
    cache: &Arc<CacheEngine<String>>,
    key: &'static str,
    count: usize,
) -> Vec<thread::JoinHandle<refresh_cache::Lookup<String>>> {
    (0..count)
        .map(|_| {
            let cache = Arc::clone(cache);
            thread::spawn(move || cache.get(key, INDEFINITE_EXPIRY, None).unwrap())
        })
        .collect()
}

#[test]
fn test_single_refresher_under_contention() {
    let cache = engine(false);
    cache.put("hot", "v1".to_string()).unwrap();
    cache.flush_entry("hot").unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get("hot", INDEFINITE_EXPIRY, None).unwrap()
            })
        })
        .collect();

    let lookups: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let owners = lookups.iter().filter(|l| l.owns_update).count();

    assert_eq!(owners, 1);
    for lookup in &lookups {
        assert_eq!(lookup.access, AccessKind::StaleHit);
        assert_eq!(lookup.content.as_deref(), Some("v1"));
    }
}

#[test]
fn test_waiters_on_new_entry_receive_put_content() {
    let cache = engine(false);
    let owner = cache.get("fresh", INDEFINITE_EXPIRY, None).unwrap();
    assert!(owner.owns_update);

    let handles = spawn_lookups(&cache, "fresh", THREADS);
    thread::sleep(Duration::from_millis(100));
    cache.put("fresh", "built".to_string()).unwrap();

    for handle in handles {
        let lookup = handle.join().unwrap();
        assert_eq!(lookup.access, AccessKind::Hit);
        assert!(!lookup.owns_update);
        assert_eq!(lookup.content.as_deref(), Some("built"));
    }
}

#[test]
fn test_cancel_hands_refresh_to_exactly_one_waiter() {
    let cache = engine(false);
    assert!(cache.get("job", INDEFINITE_EXPIRY, None).unwrap().owns_update);

    let (tx, rx) = mpsc::channel();
    for _ in 0..WAITERS {
        let cache = Arc::clone(&cache);
        let tx = tx.clone();
        thread::spawn(move || {
            let lookup = cache.get("job", INDEFINITE_EXPIRY, None).unwrap();
            tx.send(lookup).unwrap();
        });
    }
    thread::sleep(Duration::from_millis(100));
    cache.cancel_update("job").unwrap();

    // The others keep waiting until the new owner stores content
    let owner = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(owner.access, AccessKind::Miss);
    assert!(owner.owns_update);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    cache.put("job", "done".to_string()).unwrap();

    for _ in 1..WAITERS {
        let lookup = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(lookup.access, AccessKind::Hit);
        assert!(!lookup.owns_update);
        assert_eq!(lookup.content.as_deref(), Some("done"));
    }
}

#[test]
fn test_remove_releases_waiters() {
    let cache = engine(false);
    assert!(cache.get("doomed", INDEFINITE_EXPIRY, None).unwrap().owns_update);

    let handles = spawn_lookups(&cache, "doomed", 1);
    thread::sleep(Duration::from_millis(100));
    cache.remove("doomed").unwrap();

    // The waiter starts over against a fresh entry and becomes its refresher
    let lookup = handles.into_iter().next().unwrap().join().unwrap();
    assert_eq!(lookup.access, AccessKind::Miss);
    assert!(lookup.owns_update);
}

#[test]
fn test_blocking_mode_waits_for_reload() {
    let cache = engine(true);
    cache.put("page", "v1".to_string()).unwrap();
    cache.flush_entry("page").unwrap();

    let owner = cache.get("page", INDEFINITE_EXPIRY, None).unwrap();
    assert!(owner.owns_update);
    assert_eq!(owner.content.as_deref(), Some("v1"));

    let handles = spawn_lookups(&cache, "page", THREADS);
    thread::sleep(Duration::from_millis(100));
    cache.put("page", "v2".to_string()).unwrap();

    for handle in handles {
        let lookup = handle.join().unwrap();
        assert_eq!(lookup.access, AccessKind::Hit);
        assert_eq!(lookup.content.as_deref(), Some("v2"));
    }
}

#[test]
fn test_mixed_load_completes() {
    let cache = Arc::new(
        CacheEngine::builder()
            .policy(PolicyKind::Lru)
            .capacity(4)
            .build(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache: Arc<CacheEngine<String>> = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("key{}", (i * 7 + t) % 10);
                    let lookup = cache.get(&key, 0, None).unwrap();
                    if lookup.owns_update {
                        cache.put(&key, format!("{}-{}", t, i)).unwrap();
                    }
                    if i % 50 == 0 {
                        cache.remove(&key).unwrap();
                    }
                    if i % 120 == 0 {
                        cache.flush_group("unused");
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.stale_hits + stats.misses, (THREADS * 500) as u64);
}
