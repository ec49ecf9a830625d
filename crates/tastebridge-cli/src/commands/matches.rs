use anyhow::{Context, Result};

use tastebridge_core::model::TrackMatch;
use tastebridge_core::MatchStore;

use crate::app::App;

fn print_match(m: &TrackMatch) {
    let kind = if m.is_manual_override {
        "manual".to_string()
    } else {
        format!("auto {:.2}", m.score)
    };
    println!(
        "  {} → {}  {} - {}  [{}, {}]  {}",
        m.source_id,
        m.target_id,
        m.artist,
        m.title,
        kind,
        m.content_kind.as_str(),
        m.cached_at.format("%Y-%m-%d %H:%M")
    );
}

pub fn list(app: &App, limit: usize) -> Result<()> {
    let matches = app.db.list_matches(limit).context("Failed to read match cache")?;
    if matches.is_empty() {
        println!("No cached matches.");
        return Ok(());
    }
    for m in &matches {
        print_match(m);
    }
    Ok(())
}

pub fn show(app: &App, source_id: &str) -> Result<()> {
    match app.db.get_match(source_id).context("Failed to read match cache")? {
        Some(m) => print_match(&m),
        None => println!("No match cached for {source_id}."),
    }
    Ok(())
}

pub fn target(app: &App, target_id: &str) -> Result<()> {
    let matches = app
        .resolver
        .matches_for_target(target_id)
        .context("Failed to read match cache")?;
    if matches.is_empty() {
        println!("Nothing is matched to {target_id}.");
    }
    for m in &matches {
        print_match(m);
    }
    Ok(())
}

pub fn override_match(
    app: &App,
    source_id: &str,
    target_id: &str,
    title: &str,
    artist: &str,
) -> Result<()> {
    let entry = app
        .resolver
        .override_match(source_id, target_id, title, artist)
        .context("Failed to save override")?;
    println!("✓ Pinned");
    print_match(&entry);
    Ok(())
}
