use super::*;

fn answer(text: &str) -> Answer {
    Answer {
        response: text.to_string(),
        context_used: String::new(),
        sources: Vec::new(),
    }
}

#[test]
fn key_is_pinned_to_sha256_of_normalized_question() {
    // hex(sha256("what is the om mantra?"))
    assert_eq!(
        cache_key("  What is the OM mantra?  "),
        "0b7a79de118f90bd197f8054c973d86159f45ae9b50e448514f269c4121a2635"
    );
    // hex(sha256("tell me about breath meditation"))
    assert_eq!(
        cache_key("Tell me about breath meditation"),
        "8c1fac1445d8f8b49a14d361b7dfe677bd706bf1169328bed825e501c3f44d31"
    );
}

#[test]
fn case_and_whitespace_variants_share_an_entry() {
    let cache = ResponseCache::new(10, Duration::from_secs(60));
    cache.set("What is dharana?", answer("focused concentration"));

    for variant in ["what is dharana?", "  WHAT IS DHARANA?  ", "What is Dharana?\n"] {
        let hit = cache.get(variant).expect("variant should hit");
        assert_eq!(hit.response, "focused concentration");
    }
}

#[test]
fn set_then_get_roundtrip() {
    let cache = ResponseCache::new(10, Duration::from_secs(60));
    let value = Answer {
        response: "a full answer".to_string(),
        context_used: "some context...".to_string(),
        sources: vec!["book://upanishads".to_string()],
    };

    cache.set("q", value.clone());
    assert_eq!(cache.get("q"), Some(value));
}

#[test]
fn expired_entries_are_misses() {
    let cache = ResponseCache::new(10, Duration::from_secs(0));
    cache.set("q", answer("gone"));

    assert_eq!(cache.get("q"), None);
    let stats = cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 1);
}

#[test]
fn capacity_evicts_earliest_inserted() {
    let cache = ResponseCache::new(2, Duration::from_secs(60));
    cache.set("first", answer("1"));
    cache.set("second", answer("2"));
    cache.set("third", answer("3"));

    assert_eq!(cache.stats().size, 2);
    assert!(cache.get("first").is_none(), "earliest entry should be evicted");
    assert!(cache.get("second").is_some());
    assert!(cache.get("third").is_some());
}

#[test]
fn hit_rate_formatting() {
    let cache = ResponseCache::new(10, Duration::from_secs(60));

    assert_eq!(cache.stats().hit_rate, "0.0%");

    for i in 0..3 {
        let _ = cache.get(&format!("miss {i}"));
    }
    cache.set("q", answer("hit me"));
    for _ in 0..7 {
        let _ = cache.get("q");
    }

    let stats = cache.stats();
    assert_eq!(stats.hits, 7);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hit_rate, "70.0%");
}

#[test]
fn clear_keeps_counters() {
    let cache = ResponseCache::new(10, Duration::from_secs(60));
    cache.set("q", answer("v"));
    let _ = cache.get("q");
    let _ = cache.get("unknown");

    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(cache.get("q").is_none());
}

#[test]
fn concurrent_access_is_safe() {
    use std::sync::Arc;

    let cache = Arc::new(ResponseCache::new(1000, Duration::from_secs(60)));
    let mut handles = Vec::new();

    for worker in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(std::thread::spawn(move || {
            for i in 0..50 {
                let question = format!("question {} {}", worker, i);
                cache.set(&question, answer("v"));
                assert!(cache.get(&question).is_some());
            }
        }));
    }

    for handle in handles {
        handle.join().expect("worker should not panic");
    }

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 8 * 50);
}
