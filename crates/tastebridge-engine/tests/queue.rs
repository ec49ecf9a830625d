//! Queue building: recommendations when the profile is available, the
//! basic seed-artist queue when it is not.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tastebridge_core::{Clock, MatchStore, MemoryStore};
use tastebridge_engine::{
    CatalogB, CatalogBItem, EngineSettings, QueueBuilder, ResolveResult, ResolverSettings,
    TrackResolver,
};

use common::{engine_harness, now, rock_listener, seed, EngineHarness, FakeCatalog, FakeCatalogB};

/// Catalog B carrying every Artist X and Artist Y track of the rock listener.
fn catalog_b() -> FakeCatalogB {
    let mut catalog = FakeCatalogB::default().with(
        "Artist X Song A",
        vec![CatalogBItem::track("b-seed", "Song A", "Artist X").with_duration(200)],
    );
    for i in 0..6 {
        let title = format!("X Song {i}");
        catalog = catalog.with(
            &format!("Artist X {title}"),
            vec![CatalogBItem::track(format!("b-x-{i}"), title, "Artist X")],
        );
    }
    catalog.with(
        "Artist Y Y Song",
        vec![CatalogBItem::track("b-y-0", "Y Song", "Artist Y")],
    )
}

/// A catalog B whose searches never answer.
#[derive(Debug)]
struct StalledCatalogB;

#[async_trait]
impl CatalogB for StalledCatalogB {
    async fn search(&self, _query: &str) -> ResolveResult<Vec<CatalogBItem>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn queue_builder_with(
    api: FakeCatalog,
    catalog: Arc<dyn CatalogB>,
    engine: EngineSettings,
    resolver: ResolverSettings,
) -> (QueueBuilder, EngineHarness) {
    let h = engine_harness(api, engine);
    let resolver = Arc::new(TrackResolver::new(
        catalog,
        Arc::new(MemoryStore::new()) as Arc<dyn MatchStore>,
        Arc::clone(&h.clock) as Arc<dyn Clock>,
        resolver,
    ));
    let builder = QueueBuilder::new(Arc::clone(&h.engine), resolver, Arc::clone(&h.status));
    (builder, h)
}

fn queue_builder(api: FakeCatalog) -> (QueueBuilder, EngineHarness) {
    queue_builder_with(
        api,
        Arc::new(catalog_b()),
        EngineSettings::default(),
        ResolverSettings::default(),
    )
}

#[tokio::test]
async fn test_queue_starts_with_seed_and_skips_unplayable() {
    let (builder, h) = queue_builder(rock_listener());

    let queue = builder.build(&seed(), 10).await;
    assert!(!queue.used_fallback);
    assert!(queue.reason.is_none());
    assert_eq!(queue.items[0].target_id, "b-seed");
    // The user-pool track has no catalog-B counterpart.
    assert!(queue.items.iter().all(|i| i.source_id != "pool-1"));
    assert!(queue.items.iter().any(|i| i.target_id == "b-y-0"));
    assert!(!h.status.fallback().active);
}

#[tokio::test]
async fn test_profile_failure_falls_back_to_basic_queue() {
    let api = rock_listener();
    api.profile_down.store(true, Ordering::SeqCst);
    let (builder, h) = queue_builder(api);

    let queue = builder.build(&seed(), 10).await;
    assert!(queue.used_fallback);
    assert!(queue.reason.is_some());
    assert_eq!(queue.items[0].target_id, "b-seed");
    assert_eq!(queue.items.len(), 7);
    assert!(queue.items[1..].iter().all(|i| i.target_id.starts_with("b-x-")));

    let notice = h.status.fallback();
    assert!(notice.active);
    assert!(notice.reason.unwrap_or_default().contains("basic queue"));
}

#[tokio::test]
async fn test_progressive_build_yields_seed_first() {
    let (builder, _h) = queue_builder(rock_listener());

    let (plan, mut rx) = builder.build_progressively(&seed(), 5).await;
    assert!(!plan.used_fallback);
    let first = rx.recv().await.unwrap();
    assert_eq!(first.source_id, "seed");

    let mut count = 1;
    while rx.recv().await.is_some() {
        count += 1;
    }
    assert!(count <= plan.tracks.len() + 1);
}

#[tokio::test]
async fn test_unavailable_basic_queue_still_plays_seed() {
    let api = rock_listener();
    api.profile_down.store(true, Ordering::SeqCst);
    api.lookups_down.store(true, Ordering::SeqCst);
    let (builder, h) = queue_builder(api);
    let seed = seed().with_album("album-a", "Album A");

    let queue = builder.build(&seed, 10).await;
    assert_eq!(queue.items.len(), 1);
    assert_eq!(queue.items[0].target_id, "b-seed");
    assert!(queue.used_fallback);
    assert!(queue.reason.unwrap().contains("basic queue unavailable"));
    assert!(h.status.fallback().active);

    let (plan, mut rx) = builder.build_progressively(&seed, 10).await;
    assert!(plan.tracks.is_empty());
    assert!(plan.used_fallback);
    assert_eq!(rx.recv().await.unwrap().target_id, "b-seed");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_stalled_seed_resolution_does_not_block_queue() {
    let engine = EngineSettings {
        seed_resolution_timeout_secs: 1,
        ..EngineSettings::default()
    };
    let resolver = ResolverSettings {
        search_timeout_secs: 1,
        ..ResolverSettings::default()
    };
    let (builder, _h) =
        queue_builder_with(rock_listener(), Arc::new(StalledCatalogB), engine, resolver);

    let queue = tokio::time::timeout(Duration::from_secs(15), builder.build(&seed(), 10))
        .await
        .expect("queue build finished");

    assert!(queue.items.is_empty());
    assert!(!queue.used_fallback);
    assert!(queue.reason.unwrap().contains("seed not resolved"));
}

#[tokio::test]
async fn test_stalled_seed_resolution_does_not_block_progressive_queue() {
    let engine = EngineSettings {
        seed_resolution_timeout_secs: 1,
        ..EngineSettings::default()
    };
    let resolver = ResolverSettings {
        search_timeout_secs: 1,
        ..ResolverSettings::default()
    };
    let (builder, _h) =
        queue_builder_with(rock_listener(), Arc::new(StalledCatalogB), engine, resolver);

    let (_plan, mut rx) = builder.build_progressively(&seed(), 5).await;
    let closed = tokio::time::timeout(Duration::from_secs(15), rx.recv())
        .await
        .expect("channel closed");
    assert!(closed.is_none());
}
