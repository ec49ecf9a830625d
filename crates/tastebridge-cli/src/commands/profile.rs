use anyhow::Result;

use tastebridge_sync::CacheQuality;

use crate::app::App;

pub async fn show_profile(app: &App, limit: usize, refresh: bool, followed: bool) -> Result<()> {
    app.require_session().await?;

    if refresh {
        println!("Refreshing profile from catalog A...");
        app.cache.force_refresh().await;
    }

    let tracks = app.cache.top_tracks(limit).await;
    let artists = app.cache.top_artists(limit).await;

    match app.cache.top_quality() {
        CacheQuality::Full => {}
        CacheQuality::Degraded => {
            let reason = app.status.fallback().reason.unwrap_or_default();
            println!("⚠ Partial profile data. {reason}");
        }
        CacheQuality::Missing => {
            println!("No profile data available yet.");
            return Ok(());
        }
    }

    println!("\nTop tracks");
    for (i, track) in tracks.iter().enumerate() {
        println!("  {:>3}. {} - {}", i + 1, track.artist_names(), track.title);
    }

    println!("\nTop artists");
    for (i, artist) in artists.iter().enumerate() {
        if artist.genres.is_empty() {
            println!("  {:>3}. {}", i + 1, artist.name);
        } else {
            println!("  {:>3}. {} ({})", i + 1, artist.name, artist.genres.join(", "));
        }
    }

    if followed {
        let followed = app.cache.followed_artists(limit).await;
        println!("\nFollowed artists ({})", followed.len());
        for artist in &followed {
            println!("  - {}", artist.name);
        }

        let related = app
            .cache
            .related_artist_names(app.config.cache.related_seed_limit)
            .await;
        println!("\nRelated artist names ({})", related.len());
        for name in related.iter().take(limit) {
            println!("  - {name}");
        }
    }

    Ok(())
}
