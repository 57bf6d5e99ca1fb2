//! `coachloop status` — show configuration and storage status.

use coachloop_config::AppConfig;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

    println!("📚 coachloop Status");
    println!("==================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Provider:       {}", config.provider.api_url);
    println!("  Model:          {}", config.provider.model);
    println!("  Embeddings:     {}", config.provider.embedding_model);
    println!("  API key:        {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Store:          {}", config.store.backend);
    println!("  Database:       {}", config.database_path().display());
    println!("  Similarity:     >= {}", config.retrieval.min_similarity);
    println!("  Quality gate:   >= {}", config.evaluation.quality_gate_minimum);
    println!("  Max iterations: {}", config.agent.max_iterations);
    println!("  Digest TTL:     {}h", config.digest.cache_ttl_hours);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `coachloop onboard` first");
    }

    Ok(())
}
