use anyhow::{Context, Result};
use serde_json::json;

use tastebridge_core::model::Track;
use tastebridge_engine::QueuePlan;

use crate::app::App;

pub async fn recommend(
    app: &App,
    track_id: &str,
    limit: usize,
    basic: bool,
    as_json: bool,
) -> Result<()> {
    app.require_session().await?;

    let seed = app
        .api
        .track(track_id)
        .await
        .with_context(|| format!("Failed to look up track {track_id}"))?;

    let plan = if basic {
        QueuePlan {
            tracks: app.engine.fallback_queue(&seed, limit).await?,
            used_fallback: true,
            reason: Some("basic queue requested".to_string()),
        }
    } else {
        app.queue_builder().plan(&seed, limit).await
    };

    let mut rows = Vec::with_capacity(plan.tracks.len());
    for track in &plan.tracks {
        rows.push((track, app.resolver.resolve(track).await));
    }

    if as_json {
        let items: Vec<_> = rows
            .iter()
            .map(|(track, item)| {
                json!({
                    "track": track,
                    "playable": item,
                })
            })
            .collect();
        let out = json!({
            "seed": seed,
            "used_fallback": plan.used_fallback,
            "reason": plan.reason,
            "items": items,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("\nAfter {}:", describe(&seed));
    if let Some(reason) = &plan.reason {
        println!("  (basic queue: {reason})");
    }
    for (i, (track, item)) in rows.iter().enumerate() {
        let target = match item {
            Some(item) if item.is_manual_override => format!("→ {} (pinned)", item.target_id),
            Some(item) => format!("→ {} ({:.2})", item.target_id, item.match_score),
            None => String::new(),
        };
        println!("  {:>3}. {} {}", i + 1, describe(track), target);
    }

    let unmatched = rows.iter().filter(|(_, item)| item.is_none()).count();
    if unmatched > 0 {
        println!("\n  {unmatched} tracks have no catalog B match yet.");
    }

    Ok(())
}

fn describe(track: &Track) -> String {
    format!("{} - {}", track.artist_names(), track.title)
}
