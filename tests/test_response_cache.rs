use bytes::Bytes;
use hls_proxy::{CachedResponse, LruResponseCache, NoopCache, ResponseCache};
use std::sync::Arc;
use tokio_test::block_on;

fn response(body: &'static [u8]) -> CachedResponse {
    CachedResponse::new(Bytes::from_static(body), "video/mp2t", Vec::new())
}

#[test]
fn test_store_and_lookup() {
    let cache = LruResponseCache::new(1024);

    block_on(async {
        assert!(cache.get("abc").await.is_none());

        cache.set("abc", response(b"segment")).await;
        let cached = cache.get("abc").await.unwrap();
        assert_eq!(cached.body, Bytes::from_static(b"segment"));
        assert_eq!(cached.content_type, "video/mp2t");
    });

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_raw_token_is_the_key() {
    let cache = LruResponseCache::new(1024);

    block_on(async {
        cache.set("tok", response(b"plain")).await;
        assert!(cache.get("tok.m3u8").await.is_none());

        cache.set("tok.m3u8", response(b"hinted")).await;
        assert_eq!(cache.get("tok").await.unwrap().body, Bytes::from_static(b"plain"));
        assert_eq!(
            cache.get("tok.m3u8").await.unwrap().body,
            Bytes::from_static(b"hinted")
        );
    });
}

#[test]
fn test_size_bound_evicts_least_recently_used() {
    // Each entry costs 10 body bytes + 10 content-type bytes
    let cache = LruResponseCache::new(60);

    block_on(async {
        cache.set("a", response(b"aaaaaaaaaa")).await;
        cache.set("b", response(b"bbbbbbbbbb")).await;
        cache.set("c", response(b"cccccccccc")).await;

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get("a").await.is_some());

        cache.set("d", response(b"dddddddddd")).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
        assert!(cache.get("d").await.is_some());
    });

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert!(stats.total_bytes <= stats.max_bytes);
}

#[test]
fn test_concurrent_writers() {
    let cache = Arc::new(LruResponseCache::new(1024 * 1024));
    let runtime = tokio::runtime::Runtime::new().unwrap();

    runtime.block_on(async {
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let key = format!("token-{}", i % 4);
                cache.set(&key, response(b"payload")).await;
                cache.get(&key).await.is_some()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    });

    assert_eq!(cache.stats().total_entries, 4);
    assert_eq!(cache.stats().total_bytes, 4 * ("payload".len() + "video/mp2t".len()));
}

#[test]
fn test_noop_cache_stores_nothing() {
    let cache = NoopCache;

    block_on(async {
        cache.set("abc", response(b"segment")).await;
        assert!(cache.get("abc").await.is_none());
    });

    assert_eq!(cache.stats().total_entries, 0);
}
