//! Queue construction: seed, recommendations, resolution.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use tastebridge_core::model::{PlayableItem, Track};
use tastebridge_core::{FallbackNotice, StatusBoard};

use crate::error::EngineError;
use crate::recommend::RecommendationEngine;
use crate::resolve::TrackResolver;

/// A playable queue and how it was obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Queue {
    /// Seed first (when it resolved), then the picks in order.
    pub items: Vec<PlayableItem>,
    pub used_fallback: bool,
    pub reason: Option<String>,
}

/// Tracks chosen for a queue, before catalog-B resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlan {
    pub tracks: Vec<Track>,
    pub used_fallback: bool,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct QueueBuilder {
    engine: Arc<RecommendationEngine>,
    resolver: Arc<TrackResolver>,
    status: Arc<StatusBoard>,
}

impl QueueBuilder {
    pub fn new(
        engine: Arc<RecommendationEngine>,
        resolver: Arc<TrackResolver>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            engine,
            resolver,
            status,
        }
    }

    /// Choose the tracks to follow `seed`.
    ///
    /// Recommendations run under the configured timeout. On timeout, error or
    /// an empty result the basic seed-artist/same-album queue is used and a
    /// fallback notice is published. If the basic queue cannot be built
    /// either, the plan is empty.
    pub async fn plan(&self, seed: &Track, limit: usize) -> QueuePlan {
        let timeout = self.engine.settings().recommendation_timeout();
        let recommendations = self.engine.get_recommendations(seed, limit);
        let outcome = match tokio::time::timeout(timeout, recommendations).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout),
        };

        let mut reason = match outcome {
            Ok(tracks) if !tracks.is_empty() => {
                return QueuePlan {
                    tracks,
                    used_fallback: false,
                    reason: None,
                };
            }
            Ok(_) => "no recommendations for this track".to_string(),
            Err(e) => e.to_string(),
        };

        log::warn!("using basic queue for {}: {reason}", seed.id);
        let basic = self.engine.fallback_queue(seed, limit);
        let fallback = match tokio::time::timeout(timeout, basic).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout),
        };
        let tracks = fallback.unwrap_or_else(|e| {
            log::warn!("basic queue unavailable for {}: {e}", seed.id);
            reason = format!("{reason}; basic queue unavailable: {e}");
            Vec::new()
        });

        self.status
            .publish_fallback(FallbackNotice::active(format!("basic queue: {reason}")));
        QueuePlan {
            tracks,
            used_fallback: true,
            reason: Some(reason),
        }
    }

    /// Build a fully resolved queue. Tracks without an acceptable catalog-B
    /// match are left out, and so is a seed that does not resolve within
    /// the seed timeout.
    pub async fn build(&self, seed: &Track, limit: usize) -> Queue {
        let timeout = self.engine.settings().seed_resolution_timeout();
        let (seed_item, plan) = tokio::join!(
            resolve_seed(&self.resolver, seed, timeout),
            self.plan(seed, limit)
        );

        let mut reason = plan.reason;
        let mut items = Vec::with_capacity(plan.tracks.len() + 1);
        match seed_item {
            Ok(item) => items.extend(item),
            Err(note) => {
                reason = Some(match reason {
                    Some(r) => format!("{r}; {note}"),
                    None => note,
                });
            }
        }
        items.extend(self.resolver.resolve_all(&plan.tracks).await);

        log::info!(
            "queue for {}: {} of {} tracks playable",
            seed.id,
            items.len(),
            plan.tracks.len() + 1
        );
        Queue {
            items,
            used_fallback: plan.used_fallback,
            reason,
        }
    }

    /// Like [`build`](Self::build), but items stream out as each resolution
    /// batch completes; the seed (if playable in time) comes first.
    pub async fn build_progressively(
        &self,
        seed: &Track,
        limit: usize,
    ) -> (QueuePlan, mpsc::Receiver<PlayableItem>) {
        let timeout = self.engine.settings().seed_resolution_timeout();
        let seed_task = {
            let resolver = Arc::clone(&self.resolver);
            let seed = seed.clone();
            tokio::spawn(async move { resolve_seed(&resolver, &seed, timeout).await })
        };

        let plan = self.plan(seed, limit).await;
        let tracks = plan.tracks.clone();
        let resolver = Arc::clone(&self.resolver);
        let (tx, rx) = mpsc::channel(tracks.len() + 1);

        tokio::spawn(async move {
            if let Ok(Ok(Some(item))) = seed_task.await {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
            let mut rest = resolver.resolve_progressively(tracks);
            while let Some(item) = rest.recv().await {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });

        (plan, rx)
    }
}

/// Resolve the seed within `timeout`. `Err` carries the reason it was given up.
async fn resolve_seed(
    resolver: &TrackResolver,
    seed: &Track,
    timeout: Duration,
) -> Result<Option<PlayableItem>, String> {
    match tokio::time::timeout(timeout, resolver.resolve(seed)).await {
        Ok(item) => Ok(item),
        Err(_) => {
            log::warn!(
                "seed {} did not resolve within {}s; queue starts without it",
                seed.id,
                timeout.as_secs()
            );
            Err(format!("seed not resolved within {}s", timeout.as_secs()))
        }
    }
}
