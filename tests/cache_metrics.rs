use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;

use agencia::application::error::AppError;
use agencia::application::mutation::MutationContext;
use agencia::application::notify::ToastBuffer;
use agencia::cache::{Mutation, QueryCache, QueryKey, QueryKind};
use agencia::infra::telemetry;

async fn slow_authors() -> Result<Vec<String>, AppError> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok(vec!["Marina".to_string()])
}

#[tokio::test]
async fn cache_and_mutation_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let cache = Arc::new(QueryCache::default());
    let key = QueryKey::new(QueryKind::Authors);

    // miss + coalesced
    let (first, second) = tokio::join!(
        cache.fetch(key.clone(), slow_authors),
        cache.fetch(key.clone(), slow_authors)
    );
    assert_eq!(first.expect("first"), second.expect("second"));

    // hit
    cache
        .fetch(key.clone(), slow_authors)
        .await
        .expect("cached");

    // invalidation through a successful write
    let mutations = MutationContext::new(Arc::clone(&cache), Arc::new(ToastBuffer::new()));
    mutations
        .run(Mutation::CreateAuthor, async { Ok::<_, AppError>(()) })
        .await
        .expect("mutation");
    assert!(!cache.contains(&key));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "agencia_query_cache_hit_total",
        "agencia_query_cache_miss_total",
        "agencia_query_cache_coalesced_total",
        "agencia_query_cache_invalidated_total",
        "agencia_mutation_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
