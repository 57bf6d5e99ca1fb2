//! `coachloop onboard` — first-time setup: config, database, learner profile.

use anyhow::Context as _;
use coachloop_config::AppConfig;
use coachloop_core::context::{Difficulty, UserContext};
use coachloop_store::SqliteStore;

pub async fn run(user: &str, week: u32, topics: Vec<String>, level: &str) -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📚 coachloop — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed to create {}", config_dir.display()))?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("   Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("   Config already exists: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load().context("failed to load configuration")?;
    let db_path = config.database_path();
    let store = SqliteStore::new(&db_path.to_string_lossy())
        .await
        .context("failed to initialize the SQLite store")?;
    println!("✅ Database ready at: {}", db_path.display());

    let difficulty: Difficulty =
        serde_json::from_value(serde_json::Value::String(level.to_lowercase()))
            .map_err(|_| anyhow::anyhow!("level must be beginner, intermediate, or advanced"))?;
    let mut context = UserContext::new(user, week, topics);
    context.difficulty = difficulty;
    store.upsert_context(&context).await?;
    println!(
        "✅ Learner profile saved: {} (week {}, {}, topics: {})",
        context.user_id,
        context.week,
        context.difficulty,
        if context.topics.is_empty() {
            "none yet".to_string()
        } else {
            context.topics_joined()
        }
    );

    if !config.has_api_key() {
        println!("\n📝 Next steps:");
        println!("   1. export COACHLOOP_API_KEY='sk-...' (or add it to config.toml)");
        println!("   2. Run: coachloop digest --user {user}");
    } else {
        println!("\n🎉 Setup complete! Run `coachloop digest --user {user}` to get started.");
    }

    Ok(())
}
