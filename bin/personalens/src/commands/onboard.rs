use personalens_core::config::{default_config_path, Config, ProviderConfig};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let path = default_config_path();

    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let mut config = Config::default();
    // Seed empty provider entries so the keys to fill in are visible.
    config
        .providers
        .insert("gemini".to_string(), ProviderConfig::default());
    config
        .providers
        .insert("anthropic".to_string(), ProviderConfig::default());
    config.save(&path)?;

    println!("✅ Configuration written to {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add an API key under \"providers\" in the config file");
    println!(
        "     (the default model is \"{}\", served by the gemini provider)",
        config.session.model
    );
    println!("  2. Run: personalens serve");

    Ok(())
}
