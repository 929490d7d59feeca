//! 内存缓存并发行为测试

use caching_abstractions::{keys, BoardCacheKey, DataCache, DataCacheExt, TreatCacheKey};
use caching_memory::MemoryDataCache;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_run_factory_once() {
    let cache = Arc::new(MemoryDataCache::new("herd"));
    let calls = Arc::new(AtomicUsize::new(0));

    let tasks = (0..32).map(|_| {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            cache
                .get_or_create("board:1:UsersOnlineStatus", Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, std::io::Error>(vec!["alice".to_string(), "bob".to_string()])
                })
                .await
                .unwrap()
        })
    });

    let values: Vec<Arc<Vec<String>>> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    assert_eq!(values[0].len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_do_not_serialize() {
    let cache = Arc::new(MemoryDataCache::new("parallel"));

    let started = std::time::Instant::now();
    let tasks = (0..8).map(|i| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let key = format!("board:1:UserDisplayName{i}");
            cache
                .get_or_create(&key, Duration::from_secs(60), move || async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, std::io::Error>(i)
                })
                .await
                .map(|value| *value)
        })
    });

    let values: Vec<usize> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(values, (0..8).collect::<Vec<_>>());
    assert!(started.elapsed() < Duration::from_millis(1200));
}

#[tokio::test]
async fn test_board_prefix_invalidation_leaves_other_boards() {
    let cache = MemoryDataCache::new("boards");
    let board_one = BoardCacheKey::new(1);
    let board_two = BoardCacheKey::new(2);

    for board in [board_one, board_two] {
        for flags in [0, 5, 31] {
            let key = board.key_for(keys::REPLACE_RULES, &flags);
            cache
                .get_or_create(&key, Duration::from_secs(60), move || async move {
                    Ok::<_, std::io::Error>(flags)
                })
                .await
                .unwrap();
        }
        let settings_key = board.key_for(keys::BOARD_SETTINGS, &"");
        cache
            .get_or_create(&settings_key, Duration::from_secs(60), || async { Ok::<_, std::io::Error>(()) })
            .await
            .unwrap();
    }
    assert_eq!(cache.len(), 8);

    let removed = cache.remove(&board_one.matching(keys::REPLACE_RULES));
    assert_eq!(removed, 3);
    assert_eq!(cache.len(), 5);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let key = board_two.key_for(keys::REPLACE_RULES, &5);
    let value = cache
        .get_or_create(&key, Duration::from_secs(60), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(99)
        })
        .await
        .unwrap();
    assert_eq!(*value, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
