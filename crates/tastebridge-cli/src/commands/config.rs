use anyhow::Result;
use tastebridge_engine::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let path = config::config_file_path();
    println!("Config file: {}", path.display());
    println!(
        "File exists: {}\n",
        if path.exists() { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  client.api_base: {}", config.client.api_base);
    println!("  client.max_retries: {}", config.client.max_retries);
    println!(
        "  cache.full_ttl / degraded_ttl: {}s / {}s",
        config.cache.full_ttl_secs, config.cache.degraded_ttl_secs
    );
    println!("  cache.tier2_timeout: {}s", config.cache.tier2_timeout_secs);
    println!("  engine.artist_cap: {}", config.engine.artist_cap);
    println!(
        "  engine.recommendation_timeout: {}s",
        config.engine.recommendation_timeout_secs
    );
    println!("  resolver.threshold: {}", config.resolver.threshold);
    println!("  resolver.batch_size: {}", config.resolver.batch_size);

    println!("\nPriority: CLI args > ENV vars (TASTEBRIDGE_*) > Config file > Defaults");

    Ok(())
}

/// Write the example config file unless one already exists.
pub fn init_config() -> Result<()> {
    let path = config::config_file_path();
    if config::ensure_config_file()? {
        println!("✓ Created {}", path.display());
    } else {
        println!("Config file already exists: {}", path.display());
    }
    Ok(())
}

pub fn show_path() {
    println!("{}", config::config_file_path().display());
}
