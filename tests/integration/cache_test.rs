//! Tool Result Cache Tests
//!
//! Read/write classification, TTL expiry, fine-grained and coarse
//! invalidation, and the cache as seen through a running plan.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use office_copilot::models::settings::CacheConfig;
use office_copilot::services::CachedOperationExecutor;
use office_copilot::{
    CopilotAgent, CopilotConfig, ExecutionMode, OperationArgs, OperationExecutor,
    OperationOutcome, ToolResultCache,
};

use super::support::FakeDocument;

fn args(value: Value) -> OperationArgs {
    match value {
        Value::Object(map) => map,
        _ => OperationArgs::new(),
    }
}

fn default_cache() -> ToolResultCache {
    ToolResultCache::new(CacheConfig::default()).unwrap()
}

fn outcome(tag: &str) -> OperationOutcome {
    OperationOutcome::ok(json!({ "tag": tag }))
}

#[test]
fn test_get_after_put_returns_stored_result() {
    let cache = default_cache();
    let a = args(json!({ "range": "A1:B4" }));
    cache.put("excel_read_range", &a, &outcome("first"));

    let hit = cache.get("excel_read_range", &a).unwrap();
    assert_eq!(hit.data, Some(json!({ "tag": "first" })));
    assert!(hit.undo.is_none());

    // Same name, different arguments
    assert!(cache
        .get("excel_read_range", &args(json!({ "range": "C1" })))
        .is_none());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
}

#[test]
fn test_writes_are_never_cached() {
    let cache = default_cache();
    let a = args(json!({ "style": "Heading 1" }));
    cache.put("word_apply_style", &a, &outcome("write"));
    assert!(cache.get("word_apply_style", &a).is_none());
    assert_eq!(cache.stats().size, 0);
    assert!(cache.is_invalidating("word_apply_style"));
    assert!(!cache.is_cacheable("word_apply_style"));
}

#[test]
fn test_ttl_selection() {
    let cache = default_cache();
    assert_eq!(
        cache.ttl_for("word_get_document_structure"),
        Duration::from_millis(20_000)
    );
    assert_eq!(cache.ttl_for("word_get_selected_text"), Duration::from_millis(3_000));
    assert_eq!(cache.ttl_for("ppt_get_slide_count"), Duration::from_millis(15_000));
    assert_eq!(cache.ttl_for("excel_read_range"), Duration::from_millis(8_000));
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let config = CacheConfig {
        short_ttl_ms: 30,
        ..CacheConfig::default()
    };
    let cache = ToolResultCache::new(config).unwrap();
    let a = OperationArgs::new();
    cache.put("word_get_selected_text", &a, &outcome("selection"));
    cache.put("word_get_paragraphs", &a, &outcome("paragraphs"));
    assert!(cache.get("word_get_selected_text", &a).is_some());

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(cache.get("word_get_selected_text", &a).is_none());
    assert!(cache.get("word_get_paragraphs", &a).is_some());
    assert_eq!(cache.stats().size, 1);
}

#[test]
fn test_fine_grained_invalidation_keeps_unrelated_entries() {
    let cache = default_cache();
    let a = OperationArgs::new();
    for name in [
        "word_get_selected_text",
        "word_get_paragraphs",
        "word_get_document_structure",
        "excel_read_range",
    ] {
        cache.put(name, &a, &outcome(name));
    }

    assert_eq!(cache.invalidate("word_format_text"), 2);
    assert!(cache.get("word_get_selected_text", &a).is_none());
    assert!(cache.get("word_get_paragraphs", &a).is_none());
    assert!(cache.get("word_get_document_structure", &a).is_some());
    assert!(cache.get("excel_read_range", &a).is_some());
    assert_eq!(cache.stats().invalidations, 2);
}

#[test]
fn test_unmapped_write_clears_its_namespace() {
    let cache = default_cache();
    let a = OperationArgs::new();
    for name in ["excel_read_range", "excel_get_sheet_names", "word_get_paragraphs"] {
        cache.put(name, &a, &outcome(name));
    }

    assert_eq!(cache.invalidate("excel_sort_range"), 2);
    assert!(cache.get("word_get_paragraphs", &a).is_some());
    assert_eq!(cache.stats().size, 1);

    // Reads never invalidate
    assert_eq!(cache.invalidate("word_get_paragraphs"), 0);
}

#[test]
fn test_oldest_entry_is_evicted_when_full() {
    let config = CacheConfig {
        max_entries: 2,
        ..CacheConfig::default()
    };
    let cache = ToolResultCache::new(config).unwrap();
    let a = OperationArgs::new();
    cache.put("word_get_paragraphs", &a, &outcome("1"));
    cache.put("word_get_style_names", &a, &outcome("2"));
    cache.put("excel_read_range", &a, &outcome("3"));

    assert_eq!(cache.stats().size, 2);
    assert!(cache.get("word_get_paragraphs", &a).is_none());
    assert!(cache.get("excel_read_range", &a).is_some());
}

#[tokio::test]
async fn test_cached_executor_serves_repeated_reads() {
    let host = Arc::new(FakeDocument::new());
    let cache = Arc::new(default_cache());
    let executor = CachedOperationExecutor::new(host.clone(), cache.clone());
    let a = args(json!({ "text": "budget" }));

    let first = executor.execute("word_search_text", &a).await.unwrap();
    let second = executor.execute("word_search_text", &a).await.unwrap();
    assert_eq!(first.data, second.data);
    assert_eq!(host.calls().len(), 1);

    executor
        .execute("word_replace_text", &args(json!({ "find": "budget", "replace": "plan" })))
        .await
        .unwrap();
    executor.execute("word_search_text", &a).await.unwrap();
    assert_eq!(
        host.calls(),
        vec!["word_search_text", "word_replace_text", "word_search_text"]
    );
}

#[tokio::test]
async fn test_failed_write_still_invalidates() {
    let host = Arc::new(FakeDocument::new().failing("word_insert_text"));
    let cache = Arc::new(default_cache());
    let executor = CachedOperationExecutor::new(host.clone(), cache.clone());
    let a = OperationArgs::new();

    executor.execute("word_get_paragraphs", &a).await.unwrap();
    assert_eq!(cache.stats().size, 1);

    let outcome = executor.execute("word_insert_text", &a).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(cache.stats().size, 0);
}

#[tokio::test]
async fn test_plan_writes_invalidate_reads_taken_earlier() {
    let agent = CopilotAgent::new(CopilotConfig::default()).unwrap();
    agent.handle_message("s", "insert a table of contents");

    let report = agent
        .confirm_and_execute("s", Arc::new(FakeDocument::new()), None, ExecutionMode::Normal)
        .await;
    assert!(report.success);

    // The structure read is cached, then dropped by the style change
    let stats = agent.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.invalidations, 1);
    assert_eq!(stats.size, 0);
}
