use anyhow::{Context, Result};
use chrono::Utc;

use tastebridge_core::model::SessionCredential;
use tastebridge_sync::CacheQuality;

use crate::app::App;

/// Store a new credential pair and exchange it for a token right away.
pub async fn login(app: &App, primary: String, secondary: String) -> Result<()> {
    app.session
        .login(&SessionCredential::new(primary, secondary))
        .context("Failed to store session credential")?;

    let token = app
        .session
        .authenticate()
        .await
        .context("Catalog A did not accept the session credential")?;

    println!("✓ Logged in");
    println!("  Access token valid until {}", token.expires_at);
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.session.logout().context("Failed to clear session")?;
    app.cache.invalidate();
    println!("✓ Logged out");
    Ok(())
}

pub fn show_status(app: &App) -> Result<()> {
    let now = Utc::now();

    println!("\n🎧 Tastebridge Status\n");
    println!("  Database: {}", app.config.database_path.display());

    println!("\n  Session");
    if app.session.has_credential() {
        match app.session.stored_token() {
            Some(token) if token.is_valid_at(now) => {
                println!("    token valid until {}", token.expires_at);
            }
            Some(token) => println!(
                "    token expired at {} (refreshed on next use)",
                token.expires_at
            ),
            None => println!("    credential stored, no token yet"),
        }
    } else {
        println!("    not logged in (run `tastebridge login`)");
    }

    println!("\n  Profile cache");
    app.cache.load_stored();
    let quality = match app.cache.top_quality() {
        CacheQuality::Full => "full",
        CacheQuality::Degraded => "degraded",
        CacheQuality::Missing => "empty",
    };
    println!("    top items: {quality}");
    if let Some(at) = app.cache.top_refreshed_at() {
        println!("    refreshed: {at}");
    }
    if let Some(remaining) = app.cache.cooldown_remaining() {
        println!("    rate-limit cooldown: {}s remaining", remaining.num_seconds());
    }

    let matches = app.db.list_matches(usize::MAX).context("Failed to read match cache")?;
    let manual = matches.iter().filter(|m| m.is_manual_override).count();
    println!("\n  Match cache");
    println!("    {} matches ({} manual)", matches.len(), manual);

    Ok(())
}
